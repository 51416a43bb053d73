mod common;

use common::MockPipeline;
use offmain_core::{BuildSession, Config, ModuleId, OutputFormat, PlaceholderToken, RewriteError, Rewriter};
use std::sync::Arc;

const NONCE: u64 = 0x5eed;

fn rewriter(config: &Config) -> Rewriter {
    Rewriter::new(config, Arc::new(BuildSession::with_nonce(NONCE)))
}

/// Output with every placeholder of the session shown as `$<index>`.
fn shown(code: &str) -> String {
    let mut out = code.to_string();
    for (range, token) in PlaceholderToken::find_all(code, NONCE).into_iter().rev() {
        out.replace_range(range, &format!("${}", token.0));
    }
    out
}

fn main_id() -> ModuleId {
    ModuleId::from("/src/main.js")
}

#[tokio::test]
async fn test_url_wrapped_reference_is_rewritten_silently() {
    let pipeline = MockPipeline::with_files(&["/src/worker.js"]);
    let rewriter = rewriter(&Config::default());
    let source = "const w = new Worker(new URL(\"./worker.js\", import.meta.url));\nw.postMessage(1);\n";

    let out = rewriter.transform(source, &main_id(), &pipeline).await.unwrap().unwrap();

    assert_eq!(
        shown(&out.code),
        "const w = new Worker(new URL($0, import.meta.url));\nw.postMessage(1);\n"
    );
    assert_eq!(out.units, vec![ModuleId::from("/src/worker.js")]);
    assert!(pipeline.diagnostics().is_empty());
    assert!(rewriter.session().is_worker_unit(&ModuleId::from("/src/worker.js")));
}

#[tokio::test]
async fn test_literal_path_warns_long_then_short() {
    let pipeline = MockPipeline::with_files(&["/src/a.js", "/src/b.js"]);
    let rewriter = rewriter(&Config::default());
    let source = "new Worker('./a.js');\nnew SharedWorker('./b.js');\n";

    let out = rewriter.transform(source, &main_id(), &pipeline).await.unwrap().unwrap();

    assert_eq!(
        shown(&out.code),
        "new Worker(new URL($0, import.meta.url));\n\
         new SharedWorker(new URL($1, import.meta.url));\n"
    );
    let diagnostics = pipeline.diagnostics();
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics[0].message.contains("suggests that the Worker should be relative to the document"));
    assert!(diagnostics[0].message.contains("new Worker(new URL('./a.js', import.meta.url))"));
    assert_eq!(
        diagnostics[1].message,
        "Treating `new SharedWorker('./b.js')` as `new SharedWorker(new URL('./b.js', import.meta.url))`"
    );
    let position = diagnostics[1].position.unwrap();
    assert_eq!((position.line, position.column), (2, 0));
    assert_eq!(diagnostics[1].module, Some(main_id()));
}

#[tokio::test]
async fn test_self_reference_needs_no_resolution() {
    let pipeline = MockPipeline::default();
    let rewriter = rewriter(&Config::default());
    let source = "if (isMain) new Worker(import.meta.url);";

    let out = rewriter.transform(source, &main_id(), &pipeline).await.unwrap().unwrap();

    assert_eq!(shown(&out.code), "if (isMain) new Worker(new URL($0, import.meta.url));");
    assert_eq!(out.units, vec![main_id()]);
    assert!(rewriter.session().is_worker_unit(&main_id()));
}

#[tokio::test]
async fn test_non_relative_paths_are_left_alone() {
    let pipeline = MockPipeline::with_files(&["/src/w.js"]);
    let rewriter = rewriter(&Config::default());
    let source = "new Worker(\"w.js\"); new Worker(new URL(\"/abs.js\", import.meta.url));";

    let out = rewriter.transform(source, &main_id(), &pipeline).await.unwrap();

    assert!(out.is_none());
    let messages = pipeline.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].starts_with("Paths passed to the Worker constructor must be relative"));
    assert!(messages[0].ends_with("Ignoring \"w.js\"."));
    assert!(messages[1].ends_with("Ignoring \"/abs.js\"."));
    assert!(pipeline.requested().is_empty());
}

#[tokio::test]
async fn test_unresolvable_path_is_an_error() {
    let pipeline = MockPipeline::default();
    let rewriter = rewriter(&Config::default());
    let source = "new Worker(new URL('./missing.js', import.meta.url));";

    let err = rewriter.transform(source, &main_id(), &pipeline).await.unwrap_err();
    match err {
        RewriteError::Unresolved { specifier, importer } => {
            assert_eq!(specifier, "./missing.js");
            assert_eq!(importer, main_id());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_same_target_shares_one_unit() {
    let pipeline = MockPipeline::with_files(&["/lib/w.js"]);
    let rewriter = rewriter(&Config::default());
    let source = "\
        const a = new Worker(new URL('../lib/w.js', import.meta.url));\n\
        const b = new Worker(new URL(\"../lib/./w.js\", import.meta.url));\n";

    let out = rewriter.transform(source, &main_id(), &pipeline).await.unwrap().unwrap();

    assert_eq!(pipeline.requested(), vec![ModuleId::from("/lib/w.js")]);
    assert_eq!(PlaceholderToken::find_all(&out.code, NONCE).len(), 2);
    assert!(PlaceholderToken::find_all(&out.code, NONCE)
        .iter()
        .all(|(_, token)| *token == PlaceholderToken(0)));
    assert_eq!(out.units.len(), 2);
}

#[tokio::test]
async fn test_out_of_order_resolution_keeps_each_reference_on_its_unit() {
    let pipeline = MockPipeline::with_files(&["/src/a.js", "/src/b.js", "/src/c.js"])
        .with_delay("./a.js", 30)
        .with_delay("./c.js", 10);
    let rewriter = rewriter(&Config::default());
    let source = "\
        new Worker(new URL('./a.js', import.meta.url));\n\
        new Worker(new URL('./b.js', import.meta.url));\n\
        new Worker(new URL('./c.js', import.meta.url));\n";

    let out = rewriter.transform(source, &main_id(), &pipeline).await.unwrap().unwrap();

    // Units were requested as their resolutions finished.
    assert_eq!(
        pipeline.requested(),
        vec![ModuleId::from("/src/b.js"), ModuleId::from("/src/c.js"), ModuleId::from("/src/a.js")]
    );
    assert_eq!(
        shown(&out.code),
        "new Worker(new URL($2, import.meta.url));\n\
         new Worker(new URL($0, import.meta.url));\n\
         new Worker(new URL($1, import.meta.url));\n"
    );
    assert_eq!(
        out.units,
        vec![ModuleId::from("/src/a.js"), ModuleId::from("/src/b.js"), ModuleId::from("/src/c.js")]
    );
}

#[tokio::test]
async fn test_bytes_outside_argument_are_preserved() {
    let pipeline = MockPipeline::with_files(&["/src/w.js"]);
    let rewriter = rewriter(&Config::default());
    let prefix = "/* new Worker('./w.js') */ const s = `new Worker('./w.js')`;\nconst w = new Worker(";
    let suffix = ", { name: 'pool' });\n// ünïcode trailer\n";
    let source = format!("{prefix}'./w.js'{suffix}");

    let out = rewriter.transform(&source, &main_id(), &pipeline).await.unwrap().unwrap();

    assert!(out.code.starts_with(prefix));
    assert!(out.code.ends_with(suffix));
    assert_eq!(out.units.len(), 1);
    // Unchanged stretches map back to themselves.
    assert_eq!(out.map.original_offset(3), Some(3));
}

#[tokio::test]
async fn test_module_only_options_are_stripped_for_declaration_output() {
    let pipeline = MockPipeline::with_files(&["/src/w.js"]);
    let rewriter = rewriter(&Config::default());
    let source = "new Worker(new URL('./w.js', import.meta.url), { type: 'module', name: 'w' });";

    let out = rewriter.transform(source, &main_id(), &pipeline).await.unwrap().unwrap();

    assert_eq!(
        shown(&out.code),
        "new Worker(new URL($0, import.meta.url), {\"name\":\"w\"});"
    );
    assert!(pipeline.diagnostics().is_empty());
}

#[tokio::test]
async fn test_options_are_kept_for_native_modules() {
    let pipeline = MockPipeline::with_files(&["/src/w.js"]);
    let config = Config {
        format: OutputFormat::Es,
        ..Config::default()
    };
    let rewriter = rewriter(&config);
    let source = "new Worker(new URL('./w.js', import.meta.url), { type: 'module' });";

    let out = rewriter.transform(source, &main_id(), &pipeline).await.unwrap().unwrap();

    assert_eq!(
        shown(&out.code),
        "new Worker(new URL($0, import.meta.url), { type: 'module' });"
    );
}

#[tokio::test]
async fn test_dynamic_options_are_reported_and_kept() {
    let pipeline = MockPipeline::with_files(&["/src/w.js"]);
    let rewriter = rewriter(&Config::default());
    let source = "new Worker(new URL('./w.js', import.meta.url), opts);";

    let out = rewriter.transform(source, &main_id(), &pipeline).await.unwrap().unwrap();

    assert_eq!(shown(&out.code), "new Worker(new URL($0, import.meta.url), opts);");
    let messages = pipeline.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("leaving `opts` untouched"));
}

#[tokio::test]
async fn test_invalid_option_values_are_reported() {
    let pipeline = MockPipeline::with_files(&["/src/w.js"]);
    let rewriter = rewriter(&Config::default());
    let source = "new Worker(new URL('./w.js', import.meta.url), { credentials: 'sometimes' });";

    rewriter.transform(source, &main_id(), &pipeline).await.unwrap().unwrap();

    let messages = pipeline.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("`credentials`"));
}

#[tokio::test]
async fn test_source_without_workers_is_untouched() {
    let pipeline = MockPipeline::default();
    let rewriter = rewriter(&Config::default());
    let source = "const worker = 'new Worker(\"./w.js\")'; new Workers('./w.js');";

    assert!(rewriter.transform(source, &main_id(), &pipeline).await.unwrap().is_none());
    assert!(pipeline.requested().is_empty());
}

#[tokio::test]
async fn test_custom_constructor_names() {
    let pipeline = MockPipeline::with_files(&["/src/w.js"]);
    let config = Config {
        worker_constructors: vec!["Thread".to_string()],
        ..Config::default()
    };
    let rewriter = rewriter(&config);
    let source = "new Thread(new URL('./w.js', import.meta.url)); new Worker(new URL('./w.js', import.meta.url));";

    let out = rewriter.transform(source, &main_id(), &pipeline).await.unwrap().unwrap();

    assert_eq!(
        shown(&out.code),
        "new Thread(new URL($0, import.meta.url)); new Worker(new URL('./w.js', import.meta.url));"
    );
}

#[tokio::test]
async fn test_url_scheme_imports() {
    let pipeline = MockPipeline::with_files(&["/src/w.js"]);
    let rewriter = rewriter(&Config::default());

    let id = rewriter
        .resolve_url_import("omt:./w.js", &main_id(), &pipeline)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(id, ModuleId::from("omt:/src/w.js"));

    assert_eq!(
        rewriter.load_url_module(&id, &pipeline).map(|code| shown(&code)).as_deref(),
        Some("export default $0;")
    );
    assert_eq!(pipeline.requested(), vec![ModuleId::from("/src/w.js")]);

    assert!(rewriter
        .resolve_url_import("./w.js", &main_id(), &pipeline)
        .await
        .unwrap()
        .is_none());
    assert!(rewriter.load_url_module(&main_id(), &pipeline).is_none());
    assert!(matches!(
        rewriter.resolve_url_import("omt:./nope.js", &main_id(), &pipeline).await,
        Err(RewriteError::Unresolved { .. })
    ));
}
