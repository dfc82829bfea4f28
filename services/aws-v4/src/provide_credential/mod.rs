mod assume_role;
pub use assume_role::AssumeRoleCredentialProvider;

mod default;
pub use default::DefaultCredentialProvider;

mod ecs;
pub use ecs::EcsCredentialProvider;

mod env;
pub use env::EnvCredentialProvider;

mod imds;
pub use imds::IMDSv2CredentialProvider;

mod profile;
pub use profile::ProfileCredentialProvider;

mod r#static;
pub use r#static::StaticCredentialProvider;

mod utils;
pub use utils::sts_endpoint;

#[cfg(test)]
pub(crate) mod testing;
