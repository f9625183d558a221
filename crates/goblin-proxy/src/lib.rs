pub mod proxy;
pub mod supervisor;

pub use supervisor::HttpProxySupervisor;
