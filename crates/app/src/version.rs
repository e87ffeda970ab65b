use std::fmt;

/// Build metadata baked in by `build.rs`
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub package_version: &'static str,
    pub repo_version: &'static str,
    pub build_profile: &'static str,
    pub build_target: &'static str,
    pub build_timestamp: &'static str,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        package_version: env!("CARGO_PKG_VERSION"),
        repo_version: env!("REPO_VERSION"),
        build_profile: env!("BUILD_PROFILE"),
        build_target: env!("BUILD_TARGET"),
        build_timestamp: env!("BUILD_TIMESTAMP"),
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "signlink {} ({}, {} build for {}, built {})",
            self.package_version,
            self.repo_version,
            self.build_profile,
            self.build_target,
            self.build_timestamp
        )
    }
}

/// Log what is starting up
pub fn report_build_info() {
    let build = build_info();
    tracing::debug!(
        version = build.package_version,
        repo_version = build.repo_version,
        build_profile = build.build_profile,
        "signlink starting up"
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display_names_package() {
        let text = build_info().to_string();
        assert!(text.starts_with(&format!("signlink {}", env!("CARGO_PKG_VERSION"))));
    }
}
