//! Typed field names for AMI blocks.

/// Error returned when parsing an unrecognized field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCoreFieldError(pub String);

impl std::fmt::Display for ParseCoreFieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown field name: {}", self.0)
    }
}

impl std::error::Error for ParseCoreFieldError {}

define_field_enum! {
    error_type: ParseCoreFieldError,
    /// Field names with protocol-level meaning in AMI blocks.
    ///
    /// These are the keys the engine itself reads or writes (`Action`,
    /// `ActionID`, `Response`) plus the ones the bundled helpers use for the
    /// login handshake and event mask control. Use with
    /// [`AmiMessage::get()`](crate::AmiMessage::get) for typo-proof lookups;
    /// arbitrary payload keys stay plain strings.
    pub enum CoreField {
        Action => "Action",
        ActionId => "ActionID",
        Response => "Response",
        Message => "Message",
        Event => "Event",
        Privilege => "Privilege",
        Username => "Username",
        Secret => "Secret",
        AuthType => "AuthType",
        Challenge => "Challenge",
        Key => "Key",
        EventMask => "EventMask",
        Command => "Command",
        Output => "Output",
        Ping => "Ping",
    }
}
