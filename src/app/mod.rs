pub mod portal;

pub use portal::{Health, LoginSuccess, PortalService, RegisteredStudent, SourceView};
