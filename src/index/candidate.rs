use super::bucket::TrajIndex;
use log::{info, warn};
use std::collections::HashSet;

/// 候选航班对 index1的flight_id字典序较小
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidatePair {
    pub index1: usize,
    pub index2: usize,
}

pub struct CandidateSet {
    pub pairs: Vec<CandidatePair>,
    pub truncated: bool,
}

// 规范化 保证无序对只有一种表示
fn canonical(index: &TrajIndex, a: usize, b: usize) -> (usize, usize) {
    if index.trajs[a].flight_id <= index.trajs[b].flight_id {
        (a, b)
    } else {
        (b, a)
    }
}

/// 遍历所有桶生成去重后的候选对
/// 达到全局上限后提前结束 结果标记为截断而不是报错
pub fn generate_candidates(index: &TrajIndex, max_pairs: usize) -> CandidateSet {
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    let mut pairs: Vec<CandidatePair> = Vec::new();
    let mut truncated = false;
    'outer: for members in index.buckets() {
        if members.len() < 2 {
            continue;
        }
        let members: Vec<usize> = members.iter().copied().collect();
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let (a, b) = canonical(index, members[i], members[j]);
                if !seen.insert((a, b)) {
                    continue;
                }
                if pairs.len() >= max_pairs {
                    warn!("candidate pairs hit limit {}, stop generation", max_pairs);
                    truncated = true;
                    break 'outer;
                }
                pairs.push(CandidatePair { index1: a, index2: b });
            }
        }
    }
    info!(
        "generated {} candidate pairs from {} buckets, truncated: {}",
        pairs.len(),
        index.bucket_count(),
        truncated
    );
    CandidateSet { pairs, truncated }
}
