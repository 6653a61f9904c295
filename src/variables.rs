use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, SiteError};

/// checked in order, first non-empty value wins.
pub const ACCOUNT_VARS: &[&str] = &["CDK_DEFAULT_ACCOUNT", "AWS_ACCOUNT_ID"];
pub const REGION_VARS: &[&str] = &["CDK_DEFAULT_REGION", "AWS_REGION", "AWS_DEFAULT_REGION"];

/// region codes a bucket name can end in. Anything else is only warned about,
/// new regions show up faster than this list is updated.
pub const KNOWN_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "ca-central-1",
    "ca-west-1",
    "eu-north-1",
    "eu-west-3",
    "eu-west-2",
    "eu-west-1",
    "eu-central-1",
    "eu-central-2",
    "eu-south-1",
    "eu-south-2",
    "ap-south-1",
    "ap-south-2",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-east-1",
    "sa-east-1",
    "cn-north-1",
    "cn-northwest-1",
    "us-gov-east-1",
    "us-gov-west-1",
    "me-south-1",
    "me-central-1",
    "il-central-1",
    "af-south-1",
];

pub fn is_known_region(region: &str) -> bool {
    KNOWN_REGIONS.contains(&region)
}

/// The account and region a stack is deployed into.
/// Both values are only ever interpolated into resource names, they are
/// not checked against AWS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

impl Environment {
    pub fn new<S: AsRef<str>, S1: AsRef<str>>(account: S, region: S1) -> Self {
        Self {
            account: account.as_ref().into(),
            region: region.as_ref().into(),
        }
    }

    /// reads the ambient account and region from the process environment.
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_env_map(&vars)
    }

    /// like `from_env`, but values missing from the process environment
    /// are looked up in the given .env file.
    pub fn from_dot_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_dot_env_with(std::env::vars(), path)
    }

    /// `process_vars` override whatever the file sets.
    pub fn from_dot_env_with<I, P>(process_vars: I, path: P) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
        P: AsRef<Path>,
    {
        let mut vars = load_dot_env(path)?;
        vars.extend(process_vars);
        Self::from_env_map(&vars)
    }

    pub fn from_env_map(vars: &HashMap<String, String>) -> Result<Self> {
        let account = first_set(vars, ACCOUNT_VARS)
            .ok_or_else(|| SiteError::MissingEnvironment(ACCOUNT_VARS[0].to_string()))?;
        let region = first_set(vars, REGION_VARS)
            .ok_or_else(|| SiteError::MissingEnvironment(REGION_VARS[0].to_string()))?;
        if !is_known_region(&region) {
            tracing::warn!(%region, "not a known aws region code");
        }
        Ok(Self::new(account, region))
    }
}

fn first_set(vars: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| vars.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(|v| v.to_string())
}

pub fn parse_dot_env(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((key, val)) = line.split_once('=') {
            let val = val.trim().trim_matches('"').trim_matches('\'');
            map.insert(key.trim().into(), val.into());
        }
    }
    map
}

pub fn load_dot_env<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| SiteError::io(path, e))?;
    tracing::debug!(?path, "loaded .env file");
    Ok(parse_dot_env(&contents))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn prefers_cdk_variables() {
        let env = Environment::from_env_map(&vars(&[
            ("CDK_DEFAULT_ACCOUNT", "123456789012"),
            ("AWS_ACCOUNT_ID", "999999999999"),
            ("CDK_DEFAULT_REGION", "us-east-1"),
            ("AWS_REGION", "eu-west-1"),
        ])).unwrap();
        assert_eq!(env, Environment::new("123456789012", "us-east-1"));
    }

    #[test]
    fn falls_back_to_aws_variables() {
        let env = Environment::from_env_map(&vars(&[
            ("CDK_DEFAULT_ACCOUNT", ""),
            ("AWS_ACCOUNT_ID", "111111111111"),
            ("AWS_DEFAULT_REGION", "eu-central-1"),
        ])).unwrap();
        assert_eq!(env.account, "111111111111");
        assert_eq!(env.region, "eu-central-1");
    }

    #[test]
    fn reports_missing_variable_by_name() {
        let err = Environment::from_env_map(&vars(&[("CDK_DEFAULT_ACCOUNT", "123456789012")])).unwrap_err();
        match err {
            SiteError::MissingEnvironment(name) => assert_eq!(name, "CDK_DEFAULT_REGION"),
            e => panic!("unexpected error {e}"),
        }
        let err = Environment::from_env_map(&vars(&[])).unwrap_err();
        assert!(matches!(err, SiteError::MissingEnvironment(name) if name == "CDK_DEFAULT_ACCOUNT"));
    }

    #[test]
    fn unknown_region_is_not_an_error() {
        let env = Environment::from_env_map(&vars(&[
            ("CDK_DEFAULT_ACCOUNT", "123456789012"),
            ("CDK_DEFAULT_REGION", "local-1"),
        ])).unwrap();
        assert_eq!(env.region, "local-1");
    }

    #[test]
    fn parses_dot_env_files() {
        let contents = "
# deploy target
CDK_DEFAULT_ACCOUNT=123456789012
export CDK_DEFAULT_REGION=\"us-west-2\"
not a pair
";
        let map = parse_dot_env(contents);
        assert_eq!(map.len(), 2);
        assert_eq!(map["CDK_DEFAULT_ACCOUNT"], "123456789012");
        assert_eq!(map["CDK_DEFAULT_REGION"], "us-west-2");
    }

    #[test]
    fn missing_dot_env_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dot_env(dir.path().join("nope.env")).unwrap_err();
        assert!(matches!(err, SiteError::Io { .. }));
    }

    #[test]
    fn knows_common_regions() {
        assert!(is_known_region("us-east-1"));
        assert!(is_known_region("eu-west-1"));
        assert!(is_known_region("ap-southeast-2"));
        assert!(!is_known_region("mars-north-1"));
        assert!(!is_known_region("US-EAST-1"));
    }

    #[test]
    fn reads_account_and_region_from_dot_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "CDK_DEFAULT_ACCOUNT=123456789012\nCDK_DEFAULT_REGION=eu-west-1\n").unwrap();
        let env = Environment::from_dot_env_with(vec![], &path).unwrap();
        assert_eq!(env, Environment::new("123456789012", "eu-west-1"));
    }

    #[test]
    fn process_environment_wins_over_dot_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "CDK_DEFAULT_ACCOUNT=123456789012\nCDK_DEFAULT_REGION=eu-west-1\n").unwrap();
        let process = vars(&[("CDK_DEFAULT_REGION", "us-west-2"), ("UNRELATED", "x")]);
        let env = Environment::from_dot_env_with(process, &path).unwrap();
        assert_eq!(env, Environment::new("123456789012", "us-west-2"));
    }

    #[test]
    fn dot_env_can_fill_in_what_the_process_lacks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "export AWS_REGION='ap-south-1'\n").unwrap();
        let env = Environment::from_dot_env_with(vars(&[("AWS_ACCOUNT_ID", "111111111111")]), &path).unwrap();
        assert_eq!(env, Environment::new("111111111111", "ap-south-1"));
        let err = Environment::from_dot_env_with(vec![], &path).unwrap_err();
        assert!(matches!(err, SiteError::MissingEnvironment(name) if name == "CDK_DEFAULT_ACCOUNT"));
    }
}
