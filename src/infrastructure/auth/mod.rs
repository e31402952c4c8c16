pub mod middleware;
pub mod request_id;

pub use middleware::{csrf_middleware, RelaySession, X_CSRF_TOKEN};
pub use request_id::{request_id_middleware, RequestId};
