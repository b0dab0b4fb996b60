use scanmap_protocol::{ArtifactUri, LocalUri};
use scanmap_rebase::{
    local_uri_from_path, CaseSensitivity, DistinctNameIndex, ExistenceProber, FsProber, NoPicker,
    PathNormalizer, UriRebaser,
};
use std::sync::Arc;

#[tokio::test]
async fn fs_prober_distinguishes_files_from_directories() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let file = dir.path().join("report.txt");
    tokio::fs::write(&file, "x").await.expect("write");

    let prober = FsProber;
    assert!(prober.exists(&local_uri_from_path(&file)).await);
    assert!(!prober.exists(&local_uri_from_path(dir.path())).await);
    assert!(
        !prober
            .exists(&local_uri_from_path(&dir.path().join("absent.txt")))
            .await
    );
}

#[tokio::test]
async fn fs_prober_rejects_non_file_schemes() {
    assert!(!FsProber.exists(&LocalUri::new("http://host/a.txt")).await);
}

#[tokio::test]
async fn suffix_overlap_resolves_against_a_real_checkout() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let src = dir.path().join("proj").join("src");
    tokio::fs::create_dir_all(&src).await.expect("mkdir");
    tokio::fs::write(src.join("main.rs"), "fn main() {}")
        .await
        .expect("write");

    let normalizer = PathNormalizer::new(CaseSensitivity::Sensitive);
    let mut rebaser = UriRebaser::new(
        normalizer,
        DistinctNameIndex::empty(normalizer),
        Arc::new(FsProber),
        Arc::new(NoPicker),
    );
    rebaser.set_uri_bases(vec![local_uri_from_path(&dir.path().join("proj"))]);

    let got = rebaser
        .resolve_auto(&ArtifactUri::new("file:///ci/agent/proj/src/main.rs"))
        .await;
    assert_eq!(got, Some(local_uri_from_path(&src.join("main.rs"))));

    // The learned base pair now rewrites the sibling directly.
    tokio::fs::write(src.join("lib.rs"), "")
        .await
        .expect("write");
    let sibling = rebaser
        .resolve_auto(&ArtifactUri::new("file:///ci/agent/proj/src/lib.rs"))
        .await;
    assert_eq!(sibling, Some(local_uri_from_path(&src.join("lib.rs"))));
}
