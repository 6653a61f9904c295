use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::assets::AssetSource;
use crate::error::{Result, SiteError};
use crate::intrinsics::*;
use crate::stack::*;
use crate::variables::Environment;

mod iam;
pub use iam::*;
mod lambda;
pub use lambda::*;
mod s3_bucket;
pub use s3_bucket::*;
mod cloudfront;
pub use cloudfront::*;
mod deployment;
pub use deployment::*;

// higher level resources:
mod static_website;
pub use static_website::*;
