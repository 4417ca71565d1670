/// Stream session state machine.
///
/// ```text
/// create() ──► ready ◄──► started
///                 │          │
///                 └─► drop ◄─┘   (started sessions stop first)
/// ```
///
/// A session value only exists after negotiation succeeded, so there is no
/// uninitialized state to represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Ready,
    Started,
}

impl StreamState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }
}
