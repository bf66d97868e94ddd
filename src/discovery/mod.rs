//! Static asset discovery module
//!
//! Builds the prefix -> file-root bindings at startup by scanning the
//! configured web root (including the `bundles` symlink farm) and merging
//! compatibility-layer roots contributed by registered kernels.
//!
//! Discovery is best-effort: a missing or unreadable directory at any step
//! is skipped silently and never aborts startup. The returned sequence is
//! ordered; a later binding for an identical prefix overwrites an earlier
//! one when the route table is frozen.

use std::fs;
use std::path::{Path, PathBuf};

use crate::kernel::KernelRegistry;
use crate::logger;

/// Serving ceiling applied to every discovered asset root.
pub const MAX_ASSET_FILE_BYTES: u64 = 4_000_000;

/// Kernel parameter naming the compatibility-layer root directory.
pub const COMPAT_ROOT_PARAM: &str = "midgard.midcomcompat.root";

/// One filesystem directory exposed for static serving under a URL prefix.
/// Immutable after discovery, process-scoped.
#[derive(Debug, Clone)]
pub struct AssetRoot {
    pub url_prefix: String,
    pub fs_path: PathBuf,
    pub max_file_bytes: u64,
}

impl AssetRoot {
    fn new(url_prefix: String, fs_path: PathBuf) -> Self {
        Self {
            url_prefix,
            fs_path,
            max_file_bytes: MAX_ASSET_FILE_BYTES,
        }
    }
}

/// Run the full discovery pass: web root, then bundles, then per-kernel
/// compatibility roots in registration order.
pub fn discover(web_root: &Path, registry: &KernelRegistry) -> Vec<AssetRoot> {
    let mut roots = Vec::new();

    scan_web_root(web_root, &mut roots);
    scan_compat_roots(registry, &mut roots);

    for root in &roots {
        logger::log_asset_root(&root.url_prefix, &root.fs_path);
    }
    logger::log_discovery_summary(roots.len());

    roots
}

/// Top-level web root entries become `/name` roots; the `bundles` entry is
/// expanded one level with symlink resolution.
fn scan_web_root(web_root: &Path, roots: &mut Vec<AssetRoot>) {
    for name in list_dir(web_root) {
        let entry_path = web_root.join(&name);

        if name == "bundles" {
            scan_bundles(&entry_path, roots);
            continue;
        }
        if !entry_path.is_dir() {
            continue;
        }
        roots.push(AssetRoot::new(format!("/{name}"), entry_path));
    }
}

/// Each bundle child is resolved through symlinks to its real target;
/// children whose target no longer exists are dropped.
fn scan_bundles(bundles_dir: &Path, roots: &mut Vec<AssetRoot>) {
    for name in list_dir(bundles_dir) {
        let Ok(target) = fs::canonicalize(bundles_dir.join(&name)) else {
            // Dangling symlink or vanished entry
            continue;
        };
        roots.push(AssetRoot::new(format!("/bundles/{name}"), target));
    }
}

/// Kernels may expose a compatibility-layer root; its sibling `themes` and
/// `static` directories contribute `/midcom-static/<name>` roots.
fn scan_compat_roots(registry: &KernelRegistry, roots: &mut Vec<AssetRoot>) {
    for kernel in registry.iter() {
        let Some(compat_root) = kernel.parameter(COMPAT_ROOT_PARAM) else {
            continue;
        };
        let compat_root = PathBuf::from(compat_root);

        if let Ok(themes_root) = fs::canonicalize(compat_root.join("..").join("themes")) {
            scan_theme_dirs(&themes_root, roots);
        }

        if let Ok(static_root) = fs::canonicalize(compat_root.join("..").join("static")) {
            for name in list_dir(&static_root) {
                let path = static_root.join(&name);
                if !path.is_dir() {
                    continue;
                }
                roots.push(AssetRoot::new(format!("/midcom-static/{name}"), path));
            }
        }
    }
}

/// A theme contributes a root only when it actually ships a `static`
/// subdirectory.
fn scan_theme_dirs(themes_root: &Path, roots: &mut Vec<AssetRoot>) {
    for name in list_dir(themes_root) {
        let static_dir = themes_root.join(&name).join("static");
        if !static_dir.is_dir() {
            continue;
        }
        roots.push(AssetRoot::new(format!("/midcom-static/{name}"), static_dir));
    }
}

/// Sorted non-dot entry names of a directory; empty when unreadable.
///
/// Sorting keeps discovery order reproducible across filesystems, since
/// the overwrite rule makes order observable.
fn list_dir(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerError, HttpResponse, RequestContext};
    use crate::kernel::Kernel;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct ParamKernel {
        params: HashMap<String, String>,
    }

    impl ParamKernel {
        fn with_compat_root(root: &Path) -> Arc<dyn Kernel> {
            Arc::new(Self {
                params: HashMap::from([(
                    COMPAT_ROOT_PARAM.to_string(),
                    root.to_string_lossy().into_owned(),
                )]),
            })
        }

        fn without_params() -> Arc<dyn Kernel> {
            Arc::new(Self {
                params: HashMap::new(),
            })
        }
    }

    #[async_trait]
    impl Kernel for ParamKernel {
        fn name(&self) -> &str {
            "param-kernel"
        }

        async fn handle(
            &self,
            _ctx: &mut RequestContext,
        ) -> Result<HttpResponse, HandlerError> {
            unimplemented!("discovery never dispatches")
        }

        fn parameter(&self, name: &str) -> Option<String> {
            self.params.get(name).cloned()
        }
    }

    fn prefixes(roots: &[AssetRoot]) -> Vec<&str> {
        roots.iter().map(|r| r.url_prefix.as_str()).collect()
    }

    fn find<'a>(roots: &'a [AssetRoot], prefix: &str) -> Option<&'a AssetRoot> {
        roots.iter().find(|r| r.url_prefix == prefix)
    }

    #[test]
    fn test_top_level_directories_become_roots() {
        let web = tempfile::tempdir().unwrap();
        std::fs::create_dir(web.path().join("css")).unwrap();
        std::fs::create_dir(web.path().join("js")).unwrap();
        std::fs::create_dir(web.path().join(".hidden")).unwrap();
        std::fs::write(web.path().join("robots.txt"), "x").unwrap();

        let roots = discover(web.path(), &KernelRegistry::new());
        assert_eq!(prefixes(&roots), vec!["/css", "/js"]);
        assert_eq!(find(&roots, "/css").unwrap().max_file_bytes, 4_000_000);
    }

    #[test]
    fn test_missing_web_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("never-created");
        let roots = discover(&gone, &KernelRegistry::new());
        assert!(roots.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_bundle_symlinks_resolve_to_real_target() {
        let web = tempfile::tempdir().unwrap();
        let real = tempfile::tempdir().unwrap();
        let target = real.path().join("acme-assets");
        std::fs::create_dir(&target).unwrap();

        let bundles = web.path().join("bundles");
        std::fs::create_dir(&bundles).unwrap();
        std::os::unix::fs::symlink(&target, bundles.join("acme")).unwrap();
        std::os::unix::fs::symlink(real.path().join("gone"), bundles.join("dangling")).unwrap();

        let roots = discover(web.path(), &KernelRegistry::new());
        let acme = find(&roots, "/bundles/acme").expect("acme bundle bound");
        assert_eq!(acme.fs_path, target.canonicalize().unwrap());
        assert!(find(&roots, "/bundles/dangling").is_none());
    }

    #[test]
    fn test_bundles_entry_is_expanded_not_bound() {
        let web = tempfile::tempdir().unwrap();
        let bundles = web.path().join("bundles");
        std::fs::create_dir(&bundles).unwrap();
        std::fs::create_dir(bundles.join("plain")).unwrap();

        let roots = discover(web.path(), &KernelRegistry::new());
        assert!(find(&roots, "/bundles").is_none());
        assert!(find(&roots, "/bundles/plain").is_some());
    }

    #[test]
    fn test_theme_requires_static_subdirectory() {
        let base = tempfile::tempdir().unwrap();
        let compat = base.path().join("midcom");
        std::fs::create_dir(&compat).unwrap();
        let themes = base.path().join("themes");
        std::fs::create_dir_all(themes.join("themeA").join("static")).unwrap();
        std::fs::create_dir(themes.join("themeB")).unwrap();

        let mut registry = KernelRegistry::new();
        registry.register(ParamKernel::with_compat_root(&compat));

        let web = tempfile::tempdir().unwrap();
        let roots = discover(web.path(), &registry);
        assert!(find(&roots, "/midcom-static/themeA").is_some());
        assert!(find(&roots, "/midcom-static/themeB").is_none());
    }

    #[test]
    fn test_static_root_subdirectories_are_bound_directly() {
        let base = tempfile::tempdir().unwrap();
        let compat = base.path().join("midcom");
        std::fs::create_dir(&compat).unwrap();
        let static_root = base.path().join("static");
        std::fs::create_dir_all(static_root.join("midgard.admin")).unwrap();
        std::fs::write(static_root.join("stray.css"), "x").unwrap();

        let mut registry = KernelRegistry::new();
        registry.register(ParamKernel::with_compat_root(&compat));

        let web = tempfile::tempdir().unwrap();
        let roots = discover(web.path(), &registry);
        let bound = find(&roots, "/midcom-static/midgard.admin").expect("bound");
        assert!(bound.fs_path.ends_with("static/midgard.admin"));
        assert!(find(&roots, "/midcom-static/stray.css").is_none());
    }

    #[test]
    fn test_kernel_without_parameter_contributes_nothing() {
        let web = tempfile::tempdir().unwrap();
        let mut registry = KernelRegistry::new();
        registry.register(ParamKernel::without_params());

        let roots = discover(web.path(), &registry);
        assert!(roots.is_empty());
    }

    #[test]
    fn test_later_kernel_binding_comes_after_earlier() {
        // Two kernels claiming the same theme name: registration order must
        // be preserved so the route table's last-write-wins picks kernel 2.
        let make_compat = |name: &str| {
            let base = tempfile::tempdir().unwrap();
            let compat = base.path().join("midcom");
            std::fs::create_dir(&compat).unwrap();
            std::fs::create_dir_all(
                base.path().join("static").join("shared").join(name),
            )
            .unwrap();
            // bind /midcom-static/shared from both kernels
            (base, compat)
        };

        let (base1, compat1) = make_compat("one");
        let (base2, compat2) = make_compat("two");

        let mut registry = KernelRegistry::new();
        registry.register(ParamKernel::with_compat_root(&compat1));
        registry.register(ParamKernel::with_compat_root(&compat2));

        let web = tempfile::tempdir().unwrap();
        let roots = discover(web.path(), &registry);

        let shared: Vec<&AssetRoot> = roots
            .iter()
            .filter(|r| r.url_prefix == "/midcom-static/shared")
            .collect();
        assert_eq!(shared.len(), 2);
        assert!(shared[0].fs_path.starts_with(base1.path().canonicalize().unwrap()));
        assert!(shared[1].fs_path.starts_with(base2.path().canonicalize().unwrap()));
    }
}
