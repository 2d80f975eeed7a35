pub mod domain;
pub mod orchestrator;
pub mod ports;
pub mod probe;
pub mod reconciler;
pub mod refresher;
pub mod state_machine;
pub mod store;
pub mod units;

pub use domain::{
    Account, ChainId, ErrorOrigin, EventChannel, ListenerId, ProviderAvailability, SessionError,
    SessionEvent, TransactionRequest, TxHash, TxOutcome, TxPolicy, WalletSession,
};
pub use orchestrator::{ConnectOutcome, SendOutcome, SessionController};
pub use ports::{EventListener, PortError, ProviderPort};
pub use probe::detect;
pub use reconciler::{decode_event, EventReconciler};
pub use refresher::BalanceRefresher;
pub use state_machine::{
    connect_transition, send_transition, ConnectAction, ConnectPhase, SendAction, SendPhase,
    StateTransition, TransitionError,
};
pub use store::SessionStore;
pub use units::{chain_id_to_decimal, format_balance, parse_quantity, UnitsError};
