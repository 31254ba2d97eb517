// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

use super::*;
use crate::fs::WorkFs;
use knita_wire::FileTransfer;
use std::collections::BTreeSet;

struct VecSink {
    frames: Vec<FileTransfer>,
}

#[async_trait::async_trait]
impl FrameSink for VecSink {
    async fn send_frame(&mut self, frame: FileTransfer) -> Result<(), TransferError> {
        self.frames.push(frame);
        Ok(())
    }
}

fn write_tree(dir: &std::path::Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let full = dir.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, contents).unwrap();
    }
}

/// Runs one send and returns the (dest, is_dir) of every emitted entry,
/// sorted by dest.
async fn send_once(
    files: &[(&str, &str)],
    src: &str,
    dest: &str,
    excludes: &[&str],
) -> Vec<(String, bool)> {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), files);
    let mut sink = VecSink { frames: Vec::new() };
    let opts = SendOptions {
        dest: dest.to_string(),
        excludes: excludes.iter().map(|e| e.to_string()).collect(),
        ..Default::default()
    };
    let mut sender =
        Sender::new(WorkFs::new(dir.path()), &mut sink, "rt-1", "tx-1", opts).unwrap();
    sender.send(src).await.unwrap();

    let mut out: Vec<(String, bool)> = sink
        .frames
        .iter()
        .filter_map(|f| f.header.as_ref())
        .map(|h| (h.dest_path.clone(), h.is_dir))
        .collect();
    out.sort();
    out
}

const TEST_FS: &[(&str, &str)] = &[
    ("one/a_file.txt", "a"),
    ("one/b_file.txt", "b"),
    ("nested_1/1_file.txt", "1"),
    ("nested_1/nested_2/2_file.txt", "2"),
];

fn entries(list: &[(&str, bool)]) -> Vec<(String, bool)> {
    let mut out: Vec<(String, bool)> =
        list.iter().map(|(d, is_dir)| (d.to_string(), *is_dir)).collect();
    out.sort();
    out
}

#[yare::parameterized(
    glob_to_dot = {
        "one/*", ".",
        &[("a_file.txt", false), ("b_file.txt", false)]
    },
    contents_to_dot = {
        "one/", ".",
        &[("a_file.txt", false), ("b_file.txt", false)]
    },
    dir_to_dir = {
        "one", "two",
        &[("two", true), ("two/a_file.txt", false), ("two/b_file.txt", false)]
    },
    dir_nested_under_dir = {
        "one", "two/",
        &[("two/one", true), ("two/one/a_file.txt", false), ("two/one/b_file.txt", false)]
    },
    glob_to_dir = {
        "one/*", "two/",
        &[("two/a_file.txt", false), ("two/b_file.txt", false)]
    },
    contents_to_dir = {
        "one/", "two/",
        &[("two/a_file.txt", false), ("two/b_file.txt", false)]
    },
    glob_suffix_to_dir = {
        "one/*.txt", "foo",
        &[("foo/a_file.txt", false), ("foo/b_file.txt", false)]
    },
    glob_default_dest = {
        "one/*.txt", "",
        &[("one/a_file.txt", false), ("one/b_file.txt", false)]
    },
    contents_default_dest = {
        "one/", "",
        &[("one/a_file.txt", false), ("one/b_file.txt", false)]
    },
    dir_default_dest = {
        "one", "",
        &[("one", true), ("one/a_file.txt", false), ("one/b_file.txt", false)]
    },
    file_default_dest = {
        "one/a_file.txt", "",
        &[("one/a_file.txt", false)]
    },
    file_to_file = {
        "one/a_file.txt", "two/b_file.txt",
        &[("two/b_file.txt", false)]
    },
    file_to_dir = {
        "one/a_file.txt", "two/",
        &[("two/a_file.txt", false)]
    },
)]
fn expansion_cases(src: &str, dest: &str, want: &[(&str, bool)]) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let got = rt.block_on(send_once(TEST_FS, src, dest, &[]));
    assert_eq!(got, entries(want), "src={src} dest={dest}");
}

#[tokio::test]
async fn doublestar_walks_every_match() {
    // Overlapping matches are each walked in full; duplicate sends are
    // tolerated by the receiver.
    let got = send_once(TEST_FS, "nested_1/**", ".", &[]).await;
    let want = entries(&[
        ("nested_1", true),
        ("nested_1/1_file.txt", false),
        ("nested_1/nested_2", true),
        ("nested_1/nested_2/2_file.txt", false),
        ("1_file.txt", false),
        ("nested_2", true),
        ("nested_2/2_file.txt", false),
        ("2_file.txt", false),
    ]);
    assert_eq!(got, want);
}

#[tokio::test]
async fn doublestar_file_glob_flattens() {
    let got = send_once(TEST_FS, "nested_1/**/*.*", ".", &[]).await;
    let want = entries(&[("1_file.txt", false), ("2_file.txt", false)]);
    assert_eq!(got, want);
}

#[tokio::test]
async fn dot_root_with_single_file() {
    let got = send_once(&[("a_file.txt", "a")], ".", ".", &[]).await;
    let want = entries(&[("a_file.txt", false)]);
    assert_eq!(got, want);
}

#[tokio::test]
async fn excludes_prune_directories_wholesale() {
    let tree: &[(&str, &str)] = &[
        ("a/a.txt", "a"),
        ("b/b.txt", "b"),
        ("aa/aa.txt", "aa"),
        ("cc/dd/dd.txt", "dd"),
        ("ee/ee.txt", "ee"),
        ("ee/ee/ee.txt", "ee-ee"),
    ];
    let got = send_once(tree, ".", "", &["a/a.txt", "ee/ee", "bb*", "cc/*/**"]).await;
    // `a/a.txt` excludes only the file, not its parent; `ee/ee` excludes
    // the directory but not the sibling `ee/ee.txt`; `cc/*/**` prunes
    // `cc/dd` wholesale leaving `cc` empty.
    let want = entries(&[
        ("a", true),
        ("aa", true),
        ("aa/aa.txt", false),
        ("b", true),
        ("b/b.txt", false),
        ("cc", true),
        ("ee", true),
        ("ee/ee.txt", false),
    ]);
    assert_eq!(got, want);
}

#[tokio::test]
async fn literal_exclude_is_a_prefix_not_a_substring() {
    let tree: &[(&str, &str)] = &[("a/a.txt", "a"), ("aa/aa.txt", "aa")];
    let got = send_once(tree, ".", "", &["a"]).await;
    let want = entries(&[("aa", true), ("aa/aa.txt", false)]);
    assert_eq!(got, want);
}

#[tokio::test]
async fn chunked_file_has_contiguous_offsets() {
    let size = CHUNK_SIZE + CHUNK_SIZE / 2;
    let contents = "x".repeat(size);
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("big.bin", &contents)]);

    let mut sink = VecSink { frames: Vec::new() };
    let mut sender = Sender::new(
        WorkFs::new(dir.path()),
        &mut sink,
        "rt-1",
        "tx-1",
        SendOptions::default(),
    )
    .unwrap();
    sender.send("big.bin").await.unwrap();

    assert_eq!(sink.frames.len(), 2);
    let first = &sink.frames[0];
    assert!(first.header.is_some());
    assert_eq!(first.body.as_ref().unwrap().offset, 0);
    assert_eq!(first.body.as_ref().unwrap().data.len(), CHUNK_SIZE);
    assert!(first.trailer.is_none());
    let second = &sink.frames[1];
    assert!(second.header.is_none());
    assert_eq!(second.body.as_ref().unwrap().offset, CHUNK_SIZE as u64);
    assert_eq!(second.body.as_ref().unwrap().data.len(), CHUNK_SIZE / 2);
    assert!(second.trailer.is_some());
}

#[tokio::test]
async fn empty_file_is_header_and_trailer_only() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("empty.txt", "")]);

    let mut sink = VecSink { frames: Vec::new() };
    let mut sender = Sender::new(
        WorkFs::new(dir.path()),
        &mut sink,
        "rt-1",
        "tx-1",
        SendOptions::default(),
    )
    .unwrap();
    sender.send("empty.txt").await.unwrap();

    assert_eq!(sink.frames.len(), 1);
    let frame = &sink.frames[0];
    assert!(frame.header.is_some());
    assert!(frame.body.is_none());
    assert!(frame.trailer.is_some());
}

#[tokio::test]
async fn file_ids_are_distinct_per_file() {
    let got = {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), TEST_FS);
        let mut sink = VecSink { frames: Vec::new() };
        let mut sender = Sender::new(
            WorkFs::new(dir.path()),
            &mut sink,
            "rt-1",
            "tx-1",
            SendOptions::default(),
        )
        .unwrap();
        sender.send("one/").await.unwrap();
        sink.frames
    };
    let ids: BTreeSet<&str> = got.iter().map(|f| f.file_id.as_str()).collect();
    assert_eq!(ids.len(), 2);
}

#[tokio::test]
async fn missing_src_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = VecSink { frames: Vec::new() };
    let mut sender = Sender::new(
        WorkFs::new(dir.path()),
        &mut sink,
        "rt-1",
        "tx-1",
        SendOptions::default(),
    )
    .unwrap();
    let err = sender.send("nope.txt").await.unwrap_err();
    assert!(matches!(err, TransferError::SrcNotFound(_)), "got: {err:?}");
}

#[tokio::test]
async fn unmatched_glob_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("a.txt", "a")]);
    let mut sink = VecSink { frames: Vec::new() };
    let mut sender = Sender::new(
        WorkFs::new(dir.path()),
        &mut sink,
        "rt-1",
        "tx-1",
        SendOptions::default(),
    )
    .unwrap();
    let err = sender.send("*.rs").await.unwrap_err();
    assert!(matches!(err, TransferError::NoMatches(_)), "got: {err:?}");
}

#[tokio::test]
async fn absolute_paths_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = VecSink { frames: Vec::new() };
    let mut sender = Sender::new(
        WorkFs::new(dir.path()),
        &mut sink,
        "rt-1",
        "tx-1",
        SendOptions::default(),
    )
    .unwrap();
    let err = sender.send("/etc/passwd").await.unwrap_err();
    assert!(matches!(err, TransferError::AbsoluteSrc(_)), "got: {err:?}");
}

#[tokio::test]
async fn skip_callback_reports_excluded_entries() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("keep.txt", "k"), ("drop.txt", "d")]);
    let skipped = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let skipped2 = skipped.clone();
    let mut sink = VecSink { frames: Vec::new() };
    let opts = SendOptions {
        excludes: vec!["drop.txt".to_string()],
        on_skip: Some(Box::new(move |path, is_dir, excluded_by| {
            skipped2.lock().push((path.to_string(), is_dir, excluded_by.to_string()));
        })),
        ..Default::default()
    };
    let mut sender = Sender::new(WorkFs::new(dir.path()), &mut sink, "rt-1", "tx-1", opts).unwrap();
    sender.send(".").await.unwrap();
    assert_eq!(
        skipped.lock().as_slice(),
        &[("drop.txt".to_string(), false, "drop.txt".to_string())]
    );
}
