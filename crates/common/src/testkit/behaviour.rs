use crate::codec::ErrorObject;

/// What the mock wallet does with the next request it sees
#[derive(Debug, Clone, PartialEq)]
pub enum Behaviour {
    /// Answer like a well-behaved wallet
    Respond,
    /// Answer with failure content carrying this error
    Reject(ErrorObject),
    /// The user closes the session
    Cancel,
    /// The platform dismisses the session without a redirect
    Dismiss,
    /// Another session is already open
    Locked,
    /// Redirect with a truncated `message` parameter
    CorruptCallback,
    /// Redirect without any `message` parameter
    DropMessage,
    /// Answer normally, but correlate to a request that was never sent
    WrongCorrelation,
    /// Send the previous response again
    ReplayLast,
    /// Wrap the previous response's sealed content in a fresh message that
    /// correlates to the current request
    ReplaySealed,
    /// Never come back
    Hang,
    /// The session adapter itself fails
    Fail(String),
}
