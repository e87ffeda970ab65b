pub mod connect;
pub mod forget;
pub mod init;
pub mod request;
pub mod version;

pub use connect::Connect;
pub use forget::Forget;
pub use init::Init;
pub use request::Request;
pub use version::Version;
