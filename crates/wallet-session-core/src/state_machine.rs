use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPhase {
    Idle,
    Connecting,
    Connected,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAction {
    Begin,
    Succeed,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Ready,
    Sending,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendAction {
    Submit,
    Succeed,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition<S> {
    pub from: S,
    pub to: S,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("illegal connect transition: {from:?} --{action:?}-->")]
    Connect {
        from: ConnectPhase,
        action: ConnectAction,
    },
    #[error("illegal send transition: {from:?} --{action:?}-->")]
    Send { from: SendPhase, action: SendAction },
}

/// A finished connect (either way) may begin again; only one attempt runs at a time.
pub fn connect_transition(
    from: ConnectPhase,
    action: ConnectAction,
) -> Result<(ConnectPhase, StateTransition<ConnectPhase>), TransitionError> {
    use ConnectAction::*;
    use ConnectPhase::*;

    let to = match (from, action) {
        (Idle | Connected | Failed, Begin) => Connecting,
        (Connecting, Succeed) => Connected,
        (Connecting, Fail) => Failed,
        _ => return Err(TransitionError::Connect { from, action }),
    };
    Ok((to, StateTransition { from, to }))
}

pub fn send_transition(
    from: SendPhase,
    action: SendAction,
) -> Result<(SendPhase, StateTransition<SendPhase>), TransitionError> {
    use SendAction::*;
    use SendPhase::*;

    let to = match (from, action) {
        (Ready | Sent | Failed, Submit) => Sending,
        (Sending, Succeed) => Sent,
        (Sending, Fail) => Failed,
        _ => return Err(TransitionError::Send { from, action }),
    };
    Ok((to, StateTransition { from, to }))
}
