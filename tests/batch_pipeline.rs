mod site_stub;

use std::sync::Arc;
use std::time::Duration;

use downtrans::commands::Session;
use downtrans::config::{Config, Language, TranslatorEngine, TranslatorSettings};
use downtrans::error::TranslateError;
use downtrans::fetch::{HttpFetcher, RemoteFetcher};
use downtrans::formats::ChapterStatus;
use downtrans::retry::RetryPolicy;
use downtrans::store::ArtifactStore;
use downtrans::translate::{NoopTranslator, RemoteTranslator, Translate, build_translator};
use site_stub::{Reply, SiteStub, biquyun_toc, config_json, syosetu_chapter};

fn policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::ZERO)
}

fn session(stub: &SiteStub, root: &std::path::Path, translator: Arc<dyn Translate>) -> Session {
    let config = Config::from_json(&config_json(&stub.base_url)).unwrap();
    let store = ArtifactStore::open(root).unwrap();
    let http = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    Session::new(
        config,
        store,
        RemoteFetcher::new(Arc::new(http), policy()),
        RemoteTranslator::new(translator, policy()),
    )
    .with_workers(Some(2))
}

fn syosetu_routes() -> Vec<(&'static str, Vec<Reply>)> {
    vec![
        (
            "/n0001/1/",
            vec![Reply::ok(syosetu_chapter("第一話", &["一行目", "", "二行目"]))],
        ),
        ("/n0001/2/", vec![Reply::status(404)]),
        (
            "/n0001/3/",
            vec![Reply::ok(syosetu_chapter("第三話", &["三行目"]))],
        ),
    ]
}

#[test]
fn one_failing_chapter_does_not_affect_the_others() {
    let stub = SiteStub::spawn(syosetu_routes());
    let dir = tempfile::tempdir().unwrap();
    let session = session(&stub, dir.path(), Arc::new(NoopTranslator));

    let report = session.resolve_batch("NR", &[3, 1, 2, 1]).unwrap();
    let ordinals = report.results.iter().map(|r| r.ordinal).collect::<Vec<_>>();
    assert_eq!(ordinals, vec![1, 2, 3]);
    assert_eq!(report.results[0].status, ChapterStatus::Success);
    assert_eq!(report.results[1].status, ChapterStatus::Failure);
    assert_eq!(report.results[2].status, ChapterStatus::Success);
    assert!(!report.all_succeeded());
    assert_eq!(stub.hits("/n0001/1/"), 1);

    let store = session.store();
    let first = store.load_translated("NR", 1).unwrap().unwrap();
    assert_eq!(first.title, "第一話");
    assert_eq!(first.lines, vec!["一行目", "", "", "", "二行目", ""]);
    assert!(store.load_translated("NR", 2).unwrap().is_none());
    assert!(store.load_translated("NR", 3).unwrap().is_some());
}

#[test]
fn rerun_reuses_downloaded_chapters() {
    let stub = SiteStub::spawn(syosetu_routes());
    let dir = tempfile::tempdir().unwrap();
    let session = session(&stub, dir.path(), Arc::new(NoopTranslator));

    session.resolve_batch("NR", &[1, 3]).unwrap();
    let report = session.resolve_batch("NR", &[1, 3]).unwrap();
    assert!(report.all_succeeded());
    assert_eq!(stub.hits("/n0001/1/"), 1);
    assert_eq!(stub.hits("/n0001/3/"), 1);
}

struct PanicsOn(&'static str);

impl Translate for PanicsOn {
    fn translate(&self, text: &str, _from: Language) -> Result<String, TranslateError> {
        if text.contains(self.0) {
            panic!("translator exploded on {text}");
        }
        Ok(text.to_owned())
    }
}

#[test]
fn panicking_worker_fails_only_its_chapter() {
    let stub = SiteStub::spawn(syosetu_routes());
    let dir = tempfile::tempdir().unwrap();
    let session = session(&stub, dir.path(), Arc::new(PanicsOn("三行目")));

    let report = session.resolve_batch("NR", &[1, 3]).unwrap();
    assert_eq!(report.results[0].status, ChapterStatus::Success);
    assert_eq!(report.results[1].status, ChapterStatus::Failure);
    assert!(
        report.results[1]
            .detail
            .as_deref()
            .unwrap()
            .contains("panicked")
    );
}

#[test]
fn protected_glossary_survives_remote_translation() {
    let stub = SiteStub::spawn(vec![(
        "/n0001/1/",
        vec![Reply::ok(syosetu_chapter("第一話", &["ナルトは言った。"]))],
    )]);
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    std::fs::write(store.dict_path("NR"), "// test glossary\nナルト --> Naruto\n").unwrap();

    let settings = TranslatorSettings {
        engine: TranslatorEngine::Google,
        google_base_url: stub.base_url.clone(),
        ..TranslatorSettings::default()
    };
    let session = session(&stub, dir.path(), build_translator(&settings).unwrap());

    let result = session.resolve_one("NR", 1).unwrap();
    assert!(result.is_success(), "{result:?}");

    let translated = store.load_translated("NR", 1).unwrap().unwrap();
    assert_eq!(translated.title, "[en] 第一話");
    assert_eq!(translated.lines, vec!["[en] Narutoは言った。", ""]);
    assert_eq!(stub.hits("/translate_a/single"), 2);
}

#[test]
fn page_table_host_fails_out_of_range_chapters_without_fetching() {
    let toc = biquyun_toc("/14_14055/", &["501", "502"]);
    let chapter = |title: &str| {
        let html = format!(
            "<html><body><div class=\"bookname\"><h1>{title}</h1></div>\
             <div id=\"content\">&nbsp;&nbsp;&nbsp;&nbsp;正文。<br /><br /></div></body></html>"
        );
        encoding_rs::GBK.encode(&html).0.into_owned()
    };
    let stub = SiteStub::spawn(vec![
        ("/14_14055/", vec![Reply::ok(toc)]),
        ("/14_14055/501.html", vec![Reply::ok(chapter("第一章"))]),
        ("/14_14055/502.html", vec![Reply::ok(chapter("第二章"))]),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let session = session(&stub, dir.path(), Arc::new(NoopTranslator));

    let report = session.resolve_batch("WX", &[1, 2, 3]).unwrap();
    assert_eq!(report.results[0].status, ChapterStatus::Success);
    assert_eq!(report.results[1].status, ChapterStatus::Success);
    assert_eq!(report.results[2].status, ChapterStatus::Failure);
    assert!(
        report.results[2]
            .detail
            .as_deref()
            .unwrap()
            .contains("out of range")
    );
    assert_eq!(stub.hits("/14_14055/"), 1);

    let second = session.store().load_translated("WX", 2).unwrap().unwrap();
    assert_eq!(second.title, "第二章");
    assert_eq!(second.lines, vec!["正文。", ""]);
}

#[test]
fn page_without_chapter_markup_fails_only_that_chapter() {
    let stub = SiteStub::spawn(vec![
        (
            "/n0001/1/",
            vec![Reply::ok(syosetu_chapter("第一話", &["一行目"]))],
        ),
        (
            "/n0001/2/",
            vec![Reply::ok("<html><body><p>メンテナンス中</p></body></html>")],
        ),
        (
            "/n0001/3/",
            vec![Reply::ok(syosetu_chapter("第三話", &["三行目"]))],
        ),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let session = session(&stub, dir.path(), Arc::new(NoopTranslator));

    let report = session.resolve_batch("NR", &[1, 2, 3]).unwrap();
    assert_eq!(report.results[0].status, ChapterStatus::Success);
    assert_eq!(report.results[1].status, ChapterStatus::Failure);
    assert_eq!(report.results[2].status, ChapterStatus::Success);
    assert!(
        report.results[1]
            .detail
            .as_deref()
            .unwrap()
            .contains("extract chapter")
    );

    let store = session.store();
    assert!(store.load_translated("NR", 2).unwrap().is_none());
    assert!(store.page_path("NR", 2).exists());
}
