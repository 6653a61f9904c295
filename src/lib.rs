//! Declares the AWS infrastructure of a static website and renders it as a
//! CloudFormation template.
//!
//! ```no_run
//! use static_site::{Environment, SiteConfiguration, Stack, StaticSiteBuilder};
//!
//! # fn main() -> static_site::Result<()> {
//! let mut stack = Stack::new("my-website", Environment::from_env()?)?;
//! let site = StaticSiteBuilder::new(SiteConfiguration::new("example.com", "./dist"))
//!     .build(&mut stack)?;
//! site.add_outputs(&mut stack)?;
//! static_site::synth::synthesize(&stack, "cdk.out")?;
//! # Ok(())
//! # }
//! ```
//!
//! Nothing here talks to AWS. Provisioning, uploading the assets and
//! invalidating the distribution all happen later, when the synthesized
//! template is applied.

pub mod assets;
pub mod error;
pub mod intrinsics;
pub mod resources;
pub mod stack;
pub mod synth;
pub mod variables;

pub use error::{Result, SiteError};
pub use resources::{SiteConfiguration, StaticSite, StaticSiteBuilder};
pub use stack::{CfnResource, RemovalPolicy, Stack};
pub use variables::Environment;
