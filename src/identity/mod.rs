pub mod resolver;

pub use resolver::{IdentityMigration, identity_of, resolve_identities};
