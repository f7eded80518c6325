//! The built-in front-end and WordPress pipelines.

use url::Url;

use themekit_assets::TransformerKind;
use themekit_shared::{ProjectConfig, ProjectLayout, Result, ThemekitError};

use crate::graph::{Step, TaskDef, TaskGraph, TaskKind};

/// Modes served by the dev server rather than run as graph tasks.
pub const SERVE_MODES: &[(&str, &str)] = &[
    (
        "frontend:start",
        "Build the front-end, serve dist/ with live reload, rebuild on change",
    ),
    (
        "backend:start",
        "Proxy the local WordPress server with live reload, sync the theme on change",
    ),
];

/// Full WordPress archive URL: `<wordpress_url>/<wordpress_version>`.
pub fn wordpress_archive_url(config: &ProjectConfig) -> Result<Url> {
    let raw = format!(
        "{}/{}",
        config.backend.wordpress_url.trim_end_matches('/'),
        config.backend.wordpress_version.trim_start_matches('/')
    );
    Url::parse(&raw).map_err(|e| ThemekitError::config(format!("invalid WordPress URL '{raw}': {e}")))
}

/// Build the task graph for a project, including `[tasks]` from the config.
pub fn builtin_graph(config: &ProjectConfig, layout: &ProjectLayout) -> Result<TaskGraph> {
    let fe = &layout.frontend;
    let be = &layout.backend;
    let mut graph = TaskGraph::new();

    // Front-end
    let frontend = [
        TaskDef::step(
            "clean",
            "Delete the front-end dist folder",
            Step::Clean {
                paths: vec![fe.dist.clone()],
            },
        ),
        TaskDef::step(
            "assets",
            "Copy static assets into dist",
            Step::Copy {
                from: fe.assets.clone(),
                pattern: "**/*".into(),
                dests: vec![fe.dist.clone()],
            },
        ),
        TaskDef::step(
            "vendors",
            "Copy third-party files into dist/assets",
            Step::Copy {
                from: fe.vendors.clone(),
                pattern: "**/*".into(),
                dests: vec![fe.dist.join("assets")],
            },
        ),
        TaskDef::step(
            "styles",
            "Compile Sass into minified CSS",
            Step::Transform {
                transformer: TransformerKind::Styles,
                src: fe.styles.clone(),
                pattern: "**/*.scss".into(),
                dest: fe.dist.join("assets").join("css"),
            },
        ),
        TaskDef::step(
            "scripts",
            "Minify JavaScript",
            Step::Transform {
                transformer: TransformerKind::Scripts,
                src: fe.scripts.clone(),
                pattern: "**/*.js".into(),
                dest: fe.dist.join("assets").join("js"),
            },
        ),
        TaskDef::step(
            "images",
            "Optimize images",
            Step::Transform {
                transformer: TransformerKind::Images,
                src: fe.images.clone(),
                pattern: "**/*".into(),
                dest: fe.dist.join("assets").join("img"),
            },
        ),
        TaskDef::step(
            "templates",
            "Render Handlebars templates into HTML",
            Step::Transform {
                transformer: TransformerKind::Templates {
                    partials: fe.partials.clone(),
                },
                src: fe.templates.clone(),
                pattern: "*.hbs".into(),
                dest: fe.dist.clone(),
            },
        ),
        TaskDef::step(
            "html",
            "Minify HTML in dist",
            Step::Transform {
                transformer: TransformerKind::Html,
                src: fe.dist.clone(),
                pattern: "**/*.html".into(),
                dest: fe.dist.clone(),
            },
        ),
        TaskDef::series(
            "frontend:build",
            "Clean and rebuild the front-end bundle",
            &[
                "clean",
                "assets",
                "vendors",
                "styles",
                "scripts",
                "images",
                "templates",
                "html",
            ],
        ),
        TaskDef::step(
            "frontend:upload",
            "Upload changed front-end files",
            Step::Deploy {
                root: fe.dist.clone(),
            },
        ),
        TaskDef::series(
            "frontend:deploy",
            "Build the front-end and upload changed files",
            &["frontend:build", "frontend:upload"],
        ),
    ];

    // WordPress
    let wordpress = [
        TaskDef::step(
            "wp:clean",
            "Delete the back-end tmp and server folders",
            Step::Clean {
                paths: vec![be.tmp.clone(), be.server.clone()],
            },
        ),
        TaskDef::step(
            "wp:download",
            "Download the WordPress archive into tmp",
            Step::Download {
                url: wordpress_archive_url(config)?,
                dest: be.tmp.clone(),
                cache: true,
            },
        ),
        TaskDef::step(
            "wp:unzip",
            "Unpack WordPress into the server folder",
            Step::Extract {
                dir: be.tmp.clone(),
                dest: be.server.clone(),
                strip: 1,
            },
        ),
        TaskDef::step(
            "wp:tmp-clean",
            "Delete the back-end tmp folder",
            Step::Clean {
                paths: vec![be.tmp.clone()],
            },
        ),
        TaskDef::step(
            "wp:stage",
            "Copy the front-end build into tmp",
            Step::Copy {
                from: fe.dist.clone(),
                pattern: "**/*".into(),
                dests: vec![be.tmp.clone()],
            },
        ),
        TaskDef::step(
            "wp:rename",
            "Turn staged .html pages into .php templates",
            Step::RenameExtension {
                dir: be.tmp.clone(),
                from: "html".into(),
                to: "php".into(),
            },
        ),
        TaskDef::step(
            "wp:publish",
            "Copy staged theme files into back-end/src and the server theme",
            Step::Copy {
                from: be.tmp.clone(),
                pattern: "**/*".into(),
                dests: vec![be.src.clone(), be.theme_dir.clone()],
            },
        ),
        TaskDef::series(
            "wp:copy",
            "Seed the theme from the front-end build",
            &[
                "frontend:build",
                "wp:stage",
                "wp:rename",
                "wp:publish",
                "wp:tmp-clean",
            ],
        ),
        TaskDef::series(
            "backend:install",
            "Install WordPress and seed the theme",
            &["wp:clean", "wp:download", "wp:unzip", "wp:tmp-clean", "wp:copy"],
        ),
        TaskDef::step(
            "wp:live",
            "Copy back-end/src into the server theme",
            Step::Copy {
                from: be.src.clone(),
                pattern: "**/*".into(),
                dests: vec![be.theme_dir.clone()],
            },
        ),
        TaskDef::step(
            "backend:build",
            "Package the theme under back-end/dist",
            Step::Copy {
                from: be.src.clone(),
                pattern: "**/*".into(),
                dests: vec![be.dist_theme_dir.clone()],
            },
        ),
        TaskDef::step(
            "backend:upload",
            "Upload changed back-end files",
            Step::Deploy {
                root: be.dist.clone(),
            },
        ),
        TaskDef::series(
            "backend:deploy",
            "Package the theme and upload changed files",
            &["backend:build", "backend:upload"],
        ),
    ];

    for def in frontend.into_iter().chain(wordpress) {
        graph.insert(def)?;
    }

    for (name, custom) in &config.tasks {
        if graph.contains(name) {
            return Err(ThemekitError::config(format!(
                "[tasks.{name}] shadows a built-in task"
            )));
        }
        graph.insert(TaskDef {
            name: name.clone(),
            description: custom
                .description
                .clone()
                .unwrap_or_else(|| custom.series.join(", ")),
            kind: TaskKind::Series(custom.series.clone()),
        })?;
    }

    graph.validate()?;
    tracing::debug!(tasks = graph.len(), "task graph built");
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use themekit_deploy::MemoryRemote;
    use themekit_shared::{CustomTask, load_config};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::fsops::copy_tree;
    use crate::runner::{Runner, SilentProgress};

    const FIXTURE_SITE: &str = "../../../fixtures/site";

    /// A scratch copy of the fixture project.
    fn scratch_site() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("starter");
        copy_tree(Path::new(FIXTURE_SITE), "**/*", &[site.clone()]).unwrap();
        (dir, site)
    }

    fn setup(site: &Path) -> (Runner, TaskGraph) {
        let mut config = load_config(site).unwrap();
        config.backend.cache_downloads = false;
        let layout = ProjectLayout::resolve(&config, site);
        let graph = builtin_graph(&config, &layout).unwrap();
        (Runner::new(config, layout), graph)
    }

    #[test]
    fn frontend_build_order() {
        let config = ProjectConfig::default();
        let layout = ProjectLayout::resolve(&config, Path::new("/work/site"));
        let graph = builtin_graph(&config, &layout).unwrap();

        let plan: Vec<_> = graph
            .plan("frontend:build")
            .unwrap()
            .into_iter()
            .map(|p| p.task)
            .collect();
        assert_eq!(
            plan,
            vec!["clean", "assets", "vendors", "styles", "scripts", "images", "templates", "html"]
        );
    }

    #[test]
    fn backend_install_order() {
        let config = ProjectConfig::default();
        let layout = ProjectLayout::resolve(&config, Path::new("/work/site"));
        let graph = builtin_graph(&config, &layout).unwrap();

        let plan: Vec<_> = graph
            .plan("backend:install")
            .unwrap()
            .into_iter()
            .map(|p| p.task)
            .collect();
        assert_eq!(&plan[..4], ["wp:clean", "wp:download", "wp:unzip", "wp:tmp-clean"]);
        assert_eq!(
            &plan[plan.len() - 4..],
            ["wp:stage", "wp:rename", "wp:publish", "wp:tmp-clean"]
        );
    }

    #[test]
    fn archive_url_joins_cleanly() {
        let mut config = ProjectConfig::default();
        config.backend.wordpress_url = "https://wordpress.org/".into();
        config.backend.wordpress_version = "wordpress-6.5.zip".into();
        assert_eq!(
            wordpress_archive_url(&config).unwrap().as_str(),
            "https://wordpress.org/wordpress-6.5.zip"
        );
    }

    #[test]
    fn custom_tasks_are_validated() {
        let layout = ProjectLayout::resolve(&ProjectConfig::default(), Path::new("/work/site"));

        let mut config = ProjectConfig::default();
        config.tasks.insert(
            "ci".into(),
            CustomTask {
                description: None,
                series: vec!["frontend:build".into(), "backend:build".into()],
            },
        );
        let graph = builtin_graph(&config, &layout).unwrap();
        assert_eq!(graph.get("ci").unwrap().description, "frontend:build, backend:build");

        config.tasks.insert(
            "typo".into(),
            CustomTask {
                description: None,
                series: vec!["frontend:biuld".into()],
            },
        );
        assert!(builtin_graph(&config, &layout).is_err());

        let mut shadow = ProjectConfig::default();
        shadow.tasks.insert("clean".into(), CustomTask::default());
        assert!(matches!(
            builtin_graph(&shadow, &layout).unwrap_err(),
            ThemekitError::Config { .. }
        ));
    }

    #[tokio::test]
    async fn frontend_build_over_fixture_site() {
        let (_dir, site) = scratch_site();
        let (runner, graph) = setup(&site);

        let report = runner
            .run(&graph, "frontend:build", &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.steps.len(), 8);

        let dist = site.join("front-end/dist");
        assert!(dist.join("robots.txt").is_file());
        assert!(dist.join("assets/normalize/normalize.css").is_file());
        assert!(dist.join("assets/css/main.min.css").is_file());
        assert!(!dist.join("assets/css/_variables.min.css").exists());
        assert!(dist.join("assets/js/main.min.js").is_file());
        assert!(dist.join("assets/img/pixel.png").is_file());
        assert!(dist.join("assets/img/icons/menu.svg").is_file());

        let html = std::fs::read_to_string(dist.join("index.html")).unwrap();
        assert!(html.contains("site-header"));
        assert!(html.contains("starter"));
        assert!(!html.contains("main content"), "comments are stripped");
    }

    #[tokio::test]
    async fn wp_copy_seeds_theme_as_php() {
        let (_dir, site) = scratch_site();
        let (runner, graph) = setup(&site);

        runner.run(&graph, "wp:copy", &SilentProgress).await.unwrap();

        let theme = site.join("back-end/server/wp-content/themes/starter");
        assert!(theme.join("index.php").is_file());
        assert!(theme.join("assets/css/main.min.css").is_file());
        assert!(site.join("back-end/src/index.php").is_file());
        assert!(!site.join("back-end/src/index.html").exists());
        assert!(!site.join("back-end/tmp").exists());
    }

    #[tokio::test]
    async fn wordpress_download_and_unzip() {
        let mut archive = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut archive));
            let opts = zip::write::SimpleFileOptions::default();
            zip.start_file("wordpress/index.php", opts).unwrap();
            zip.write_all(b"<?php").unwrap();
            zip.start_file("wordpress/wp-settings.php", opts).unwrap();
            zip.write_all(b"<?php").unwrap();
            zip.finish().unwrap();
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wordpress-6.5.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
            .mount(&server)
            .await;

        let (_dir, site) = scratch_site();
        let mut config = load_config(&site).unwrap();
        config.backend.wordpress_url = server.uri();
        config.backend.wordpress_version = "wordpress-6.5.zip".into();
        config.backend.cache_downloads = false;
        let layout = ProjectLayout::resolve(&config, &site);
        let graph = builtin_graph(&config, &layout).unwrap();
        let runner = Runner::new(config, layout);

        for task in ["wp:clean", "wp:download", "wp:unzip", "wp:tmp-clean"] {
            runner.run(&graph, task, &SilentProgress).await.unwrap();
        }

        let wp = site.join("back-end/server");
        assert!(wp.join("index.php").is_file());
        assert!(wp.join("wp-settings.php").is_file());
        assert!(!site.join("back-end/tmp").exists());
    }

    #[tokio::test]
    async fn backend_deploy_uploads_packaged_theme() {
        let (_dir, site) = scratch_site();
        let (runner, graph) = setup(&site);
        let remote = MemoryRemote::new("/public_html");
        let runner = runner.with_connector(Arc::new(remote.clone()));

        let report = runner
            .run(&graph, "backend:deploy", &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.steps.len(), 2);
        assert_eq!(
            remote.paths(),
            vec![
                "/public_html/wp-content/themes/starter/index.php",
                "/public_html/wp-content/themes/starter/style.css",
            ]
        );

        let again = runner
            .run(&graph, "backend:upload", &SilentProgress)
            .await
            .unwrap();
        assert_eq!(again.output_count(), 0);
    }
}
