//! Writes a stack to disk as a cloud assembly: the template plus a manifest
//! of the assets the deployer has to upload before applying it.

use std::path::{Path, PathBuf};

use crate::assets::{fingerprint, AssetManifest, MANIFEST_VERSION};
use crate::error::{Result, SiteError};
use crate::resources::bucket_name_violations;
use crate::stack::{SavedTemplate, Stack};

#[derive(Debug, Clone, PartialEq)]
pub struct CloudAssembly {
    pub directory: PathBuf,
    pub template_file: PathBuf,
    pub asset_manifest_file: PathBuf,
    pub template: SavedTemplate,
    pub asset_manifest: AssetManifest,
}

pub fn template_file_name(stack: &Stack) -> String {
    format!("{}.template.json", stack.name())
}

pub fn asset_manifest_file_name(stack: &Stack) -> String {
    format!("{}.assets.json", stack.name())
}

/// Bucket names are never rejected, only reported. Whatever is wrong with
/// them surfaces when cloudformation creates the bucket.
fn warn_about_bucket_names(stack: &Stack, template: &SavedTemplate) {
    for (logical_id, resource) in template.resources.iter() {
        if resource.ty != "AWS::S3::Bucket" {
            continue;
        }
        let name = match resource.properties.get("BucketName").and_then(|n| n.as_str()) {
            Some(n) => n,
            None => continue,
        };
        for problem in bucket_name_violations(name) {
            tracing::warn!(stack = stack.name(), %logical_id, bucket = name, "bucket name {problem}");
        }
    }
}

pub fn synthesize<P: AsRef<Path>>(stack: &Stack, out_dir: P) -> Result<CloudAssembly> {
    let directory = out_dir.as_ref().to_path_buf();
    let template = stack.to_template()?;
    warn_about_bucket_names(stack, &template);

    let mut assets = vec![];
    for asset in stack.assets() {
        let entry = fingerprint(asset)?;
        tracing::debug!(id = %entry.id, fingerprint = %entry.fingerprint, files = entry.file_count, "fingerprinted asset");
        assets.push(entry);
    }
    let asset_manifest = AssetManifest { version: MANIFEST_VERSION, assets };

    std::fs::create_dir_all(&directory).map_err(|e| SiteError::io(&directory, e))?;
    let template_file = directory.join(template_file_name(stack));
    write_json(&template_file, &serde_json::to_string_pretty(&template)?)?;
    let asset_manifest_file = directory.join(asset_manifest_file_name(stack));
    write_json(&asset_manifest_file, &serde_json::to_string_pretty(&asset_manifest)?)?;

    Ok(CloudAssembly {
        directory,
        template_file,
        asset_manifest_file,
        template,
        asset_manifest,
    })
}

fn write_json(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| SiteError::io(path, e))?;
    tracing::info!(?path, bytes = contents.len(), "wrote");
    Ok(())
}
