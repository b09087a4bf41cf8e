use crate::fm::model::{EnrichedPair, MatchedPair};
use anyhow::Result;
use log::{error, info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// 每批落盘的记录数
pub const BATCH_SIZE: usize = 1000;

/// 匹配结果的落盘接口 由外部持久化层实现
pub trait PairSink {
    fn write_pairs(&mut self, batch: &[MatchedPair]) -> Result<()>;
    fn write_enriched(&mut self, batch: &[EnrichedPair]) -> Result<()>;
}

/// json lines文件落盘 每行一条记录
pub struct JsonlSink {
    pairs: BufWriter<File>,
    enriched: BufWriter<File>,
}

impl JsonlSink {
    pub fn create(dir: &Path) -> Result<JsonlSink> {
        std::fs::create_dir_all(dir)?;
        let pairs = BufWriter::new(File::create(dir.join("matched_pairs.jsonl"))?);
        let enriched = BufWriter::new(File::create(dir.join("enriched_pairs.jsonl"))?);
        info!("write results to {}", dir.display());
        Ok(JsonlSink { pairs, enriched })
    }
}

impl PairSink for JsonlSink {
    fn write_pairs(&mut self, batch: &[MatchedPair]) -> Result<()> {
        for rec in batch {
            serde_json::to_writer(&mut self.pairs, rec)?;
            writeln!(self.pairs)?;
        }
        self.pairs.flush()?;
        Ok(())
    }

    fn write_enriched(&mut self, batch: &[EnrichedPair]) -> Result<()> {
        for rec in batch {
            serde_json::to_writer(&mut self.enriched, rec)?;
            writeln!(self.enriched)?;
        }
        self.enriched.flush()?;
        Ok(())
    }
}

/// 分批写入 单批失败重试一次 重试仍失败记录日志后跳过该批
/// 返回实际写入的记录数
pub fn write_batched<T, F>(items: &[T], mut write: F) -> usize
where
    F: FnMut(&[T]) -> Result<()>,
{
    let mut written = 0;
    for batch in items.chunks(BATCH_SIZE) {
        let result = write(batch).or_else(|err| {
            warn!("batch write failed, retry once: {}", err);
            write(batch)
        });
        match result {
            Ok(()) => written += batch.len(),
            Err(err) => error!("batch write failed after retry, drop {} records: {}", batch.len(), err),
        }
    }
    written
}

// test
#[cfg(test)]
mod test {
    use super::*;
    use crate::fm::model::GeoPos;

    fn pair(n: usize) -> MatchedPair {
        MatchedPair {
            flight1_id: format!("A{}", n),
            flight2_id: format!("B{}", n),
            angle_diff: 1.5,
            time_gap_minutes: 30.0,
            intersection_point: GeoPos { lat: 1.0, lon: 2.0 },
            intersect_time_1: 1000,
            intersect_time_2: 2000,
            created_at: 0,
        }
    }

    #[test]
    fn test_write_batched_chunks() {
        let items: Vec<MatchedPair> = (0..2500).map(pair).collect();
        let mut batches: Vec<usize> = Vec::new();
        let written = write_batched(&items, |batch| {
            batches.push(batch.len());
            Ok(())
        });
        assert_eq!(written, 2500);
        assert_eq!(batches, vec![1000, 1000, 500]);
    }

    #[test]
    fn test_write_batched_retry() {
        let items: Vec<MatchedPair> = (0..10).map(pair).collect();
        // 第一次失败 重试成功
        let mut calls = 0;
        let written = write_batched(&items, |_| {
            calls += 1;
            if calls == 1 {
                Err(anyhow::anyhow!("transient failure"))
            } else {
                Ok(())
            }
        });
        assert_eq!(written, 10);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_write_batched_drop_after_retry() {
        let items: Vec<MatchedPair> = (0..10).map(pair).collect();
        // 一直失败 该批被丢弃 不panic
        let written = write_batched(&items, |_| Err(anyhow::anyhow!("sink down")));
        assert_eq!(written, 0);
    }

    #[test]
    fn test_jsonl_sink_roundtrip() {
        let dir = std::env::temp_dir().join("rfm_sink_test");
        let mut sink = JsonlSink::create(&dir).unwrap();
        sink.write_pairs(&[pair(0), pair(1)]).unwrap();
        let content = std::fs::read_to_string(dir.join("matched_pairs.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let back: MatchedPair = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(back.flight1_id, "A0");
        // 数值字段保持数值类型
        assert!(lines[0].contains("\"angle_diff\":1.5"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
