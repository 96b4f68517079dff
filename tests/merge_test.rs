//! Integration tests for the merge/dedup store over real dataset files

mod common;

use std::fs;
use std::path::PathBuf;

use common::{at, record};
use sinafeed::models::NewsRecord;
use sinafeed::storage::{self, discover_run_files, merge};

fn records(prefix: &str, n: usize) -> Vec<NewsRecord> {
    (0..n)
        .map(|i| record(&format!("https://news.sina.com.cn/{prefix}/{i}"), at(2025, 4, 1 + i as u32 % 20, 8, 0)))
        .collect()
}

fn write(dir: &std::path::Path, name: &str, records: &[NewsRecord]) -> PathBuf {
    let path = dir.join(name);
    storage::write_records(&path, records).unwrap();
    path
}

#[test]
fn test_merge_same_file_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "news_data_a.csv", &records("a", 7));

    let once = merge(std::slice::from_ref(&file));
    let twice = merge(&[file.clone(), file]);

    assert_eq!(once.len(), 7);
    assert_eq!(once.records(), twice.records());
}

#[test]
fn test_overlapping_files_dedup_count() {
    let dir = tempfile::tempdir().unwrap();

    let first = records("a", 10);
    let mut second = records("b", 6);
    // four urls in common
    second.extend(first[..4].iter().cloned());

    let f1 = write(dir.path(), "news_data_1.csv", &first);
    let f2 = write(dir.path(), "news_data_2.csv", &second);

    let dataset = merge(&[f1, f2]);
    assert_eq!(dataset.len(), first.len() + second.len() - 4);
}

#[test]
fn test_first_seen_duplicate_wins() {
    let dir = tempfile::tempdir().unwrap();
    let url = "https://news.sina.com.cn/c/dup.shtml";

    let mut older = record(url, at(2025, 4, 1, 8, 0));
    older.headline = String::from("旧标题");
    let mut newer = record(url, at(2025, 4, 2, 8, 0));
    newer.headline = String::from("新标题");

    let f1 = write(dir.path(), "news_data_1.csv", &[older]);
    let f2 = write(dir.path(), "news_data_2.csv", &[newer]);

    let dataset = merge(&[f1, f2]);
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.get(url).unwrap().headline, "旧标题");
}

#[test]
fn test_cleaning_after_dedup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("news_data_raw.csv");
    fs::write(
        &path,
        "\u{feff}headline,url,time,summary,tags\n\
         好,https://news.sina.com.cn/1,2025-04-01 08:00:00,摘要,\"国内,,时政\"\n\
         无时间,https://news.sina.com.cn/2,,摘要,\n\
         坏时间,https://news.sina.com.cn/3,上午,摘要,\n\
         ,https://news.sina.com.cn/4,2025-04-01 08:00:00,摘要,\n\
         无摘要,https://news.sina.com.cn/5,2025-04-01 08:00:00, ,\n",
    )
    .unwrap();

    let dataset = merge(&[path]);
    assert_eq!(dataset.len(), 1);

    let kept = dataset.get("https://news.sina.com.cn/1").unwrap();
    assert_eq!(kept.tags, vec!["国内", "时政"]);
}

#[test]
fn test_unreadable_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "news_data_1.csv", &records("a", 3));
    let missing = dir.path().join("news_data_missing.csv");
    let headerless = dir.path().join("news_data_bad.csv");
    fs::write(&headerless, "").unwrap();

    let dataset = merge(&[missing, headerless, good]);
    assert_eq!(dataset.len(), 3);
}

#[test]
fn test_canonical_file_never_an_input() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "news_data_20250401_080000.csv", &records("a", 2));
    write(dir.path(), "merged_news_data.csv", &records("z", 5));

    let files = discover_run_files(dir.path(), "news_data_").unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(merge(&files).len(), 2);
}

#[test]
fn test_persisted_dataset_merges_back_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "news_data_1.csv", &records("a", 5));

    let dataset = merge(&[file]);
    let canonical = dir.path().join("merged_news_data.csv");
    dataset.persist(&canonical).unwrap();

    assert!(fs::read(&canonical).unwrap().starts_with(b"\xEF\xBB\xBF"));
    assert_eq!(merge(&[canonical]).records(), dataset.records());
}
