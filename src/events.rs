//! Render hooks consumed by the client transport

/// Receiver of everything the client transport observes
///
/// All three methods run on the background receive task, so implementors
/// handle their own synchronization.
pub trait ChatEvents: Send + Sync + 'static {
    /// A chat line, join notice or departure notice arrived
    fn on_message(&self, text: &str);

    /// The server reported a new member count
    fn on_member_count_changed(&self, count: u8);

    /// `false` right before reconnecting starts, `true` once it succeeded
    fn on_reconnect_status(&self, success: bool);
}
