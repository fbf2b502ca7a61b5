pub mod broker;
pub mod forex;
pub mod p2p;
pub mod util;

pub use broker::BrokerProvider;
pub use forex::ForexProvider;
pub use p2p::P2pProvider;
