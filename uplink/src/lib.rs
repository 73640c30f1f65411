pub use uplink_core::UplinkError;

pub mod model {
    pub use uplink_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use uplink_client::*;
}
