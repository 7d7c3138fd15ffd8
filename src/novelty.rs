//! novelty.rs — which fetched posts have not been notified yet.

use std::collections::HashSet;

use crate::ingest::Post;
use crate::watermark::{DedupMode, Watermark, MAX_SEEN_IDS};

/// Posts of `batch` that are new relative to `mark`, in batch order.
///
/// Timestamp watermarks select posts strictly newer than the mark. Id-set
/// watermarks select posts whose identity is not in the set; an identity
/// repeated inside the batch is selected once. Neither input is modified.
pub fn select_new<'a>(batch: &'a [Post], mark: &Watermark) -> Vec<&'a Post> {
    match mark {
        Watermark::Timestamp(last) => batch.iter().filter(|p| p.timestamp > *last).collect(),
        Watermark::IdSet(seen) => {
            let mut taken: HashSet<&str> = HashSet::new();
            let mut out = Vec::new();
            for p in batch {
                let id = p.identity();
                if !seen.iter().any(|s| s == id) && taken.insert(id) {
                    out.push(p);
                }
            }
            out
        }
    }
}

/// Keep at most `cap` posts of an ascending selection. In timestamp mode the
/// cut never splits posts sharing a timestamp: the whole tie group at the
/// boundary stays in, so the mark can later move past it.
pub fn cap_selection(fresh: &mut Vec<&Post>, cap: usize, mode: DedupMode) {
    if fresh.len() <= cap {
        return;
    }
    let mut keep = cap;
    if mode == DedupMode::Timestamp && cap > 0 {
        let edge = fresh[cap - 1].timestamp;
        while keep < fresh.len() && fresh[keep].timestamp == edge {
            keep += 1;
        }
    }
    fresh.truncate(keep);
}

/// Whether delivering `fresh[i]` lets a timestamp mark move to its time:
/// true once it is the last selected post carrying that timestamp.
/// Moving earlier would hide a same-time post that may still fail.
pub fn closes_tie_group(fresh: &[&Post], i: usize) -> bool {
    match (fresh.get(i), fresh.get(i + 1)) {
        (Some(cur), Some(next)) => next.timestamp > cur.timestamp,
        _ => true,
    }
}

/// Record one notified post. Timestamps only move forward; id sets append
/// and drop the oldest past [`MAX_SEEN_IDS`].
pub fn advance(mark: &mut Watermark, post: &Post) {
    match mark {
        Watermark::Timestamp(last) => {
            if post.timestamp > *last {
                *last = post.timestamp;
            }
        }
        Watermark::IdSet(seen) => {
            let id = post.identity();
            if !seen.iter().any(|s| s == id) {
                seen.push_back(id.to_string());
            }
            while seen.len() > MAX_SEEN_IDS {
                seen.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn post(ts: f64, id: &str) -> Post {
        Post::new(format!("post {id}"), "x", format!("https://example.com/{id}"), ts, "a").with_id(id)
    }

    fn ids(v: &[&str]) -> Watermark {
        Watermark::IdSet(v.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn timestamp_mode_keeps_strictly_newer() {
        let t0 = 1_000.0;
        let batch = vec![post(t0 - 10.0, "a"), post(t0, "b"), post(t0 + 5.0, "c"), post(t0 + 20.0, "d")];
        let mut mark = Watermark::Timestamp(t0);
        let new = select_new(&batch, &mark);
        let got: Vec<_> = new.iter().map(|p| p.identity()).collect();
        assert_eq!(got, vec!["c", "d"]);

        for p in new {
            advance(&mut mark, p);
        }
        assert_eq!(mark, Watermark::Timestamp(t0 + 20.0));
    }

    #[test]
    fn timestamp_never_moves_back() {
        let mut mark = Watermark::Timestamp(50.0);
        advance(&mut mark, &post(10.0, "old"));
        assert_eq!(mark, Watermark::Timestamp(50.0));
    }

    #[test]
    fn id_set_mode_skips_seen_and_batch_duplicates() {
        let batch = vec![post(1.0, "id2"), post(2.0, "id3"), post(3.0, "id3")];
        let mark = ids(&["id1", "id2"]);
        let new = select_new(&batch, &mark);
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].identity(), "id3");
    }

    #[test]
    fn id_set_falls_back_to_link() {
        let no_id = Post::new("t", "x", "https://example.com/p", 1.0, "a");
        let mark = ids(&["https://example.com/p"]);
        assert!(select_new(std::slice::from_ref(&no_id), &mark).is_empty());
    }

    #[test]
    fn id_set_is_bounded_and_drops_oldest() {
        let mut mark = Watermark::IdSet(VecDeque::new());
        for i in 0..(MAX_SEEN_IDS + 7) {
            advance(&mut mark, &post(i as f64, &format!("id{i}")));
        }
        let Watermark::IdSet(seen) = &mark else {
            panic!("mode changed");
        };
        assert_eq!(seen.len(), MAX_SEEN_IDS);
        assert_eq!(seen.front().map(String::as_str), Some("id7"));
        assert_eq!(
            seen.back().map(String::as_str),
            Some(format!("id{}", MAX_SEEN_IDS + 6).as_str())
        );
    }

    #[test]
    fn cap_keeps_timestamp_ties_together() {
        let batch = vec![post(1.0, "a"), post(2.0, "b"), post(2.0, "c"), post(3.0, "d")];
        let mut fresh: Vec<&Post> = batch.iter().collect();
        cap_selection(&mut fresh, 2, DedupMode::Timestamp);
        let got: Vec<_> = fresh.iter().map(|p| p.identity()).collect();
        assert_eq!(got, vec!["a", "b", "c"]);

        let mut fresh: Vec<&Post> = batch.iter().collect();
        cap_selection(&mut fresh, 2, DedupMode::IdSet);
        assert_eq!(fresh.len(), 2);

        let mut fresh: Vec<&Post> = batch.iter().collect();
        cap_selection(&mut fresh, 10, DedupMode::Timestamp);
        assert_eq!(fresh.len(), 4);
    }

    #[test]
    fn tie_group_closes_on_its_last_member() {
        let batch = vec![post(1.0, "a"), post(2.0, "b"), post(2.0, "c")];
        let fresh: Vec<&Post> = batch.iter().collect();
        assert!(closes_tie_group(&fresh, 0));
        assert!(!closes_tie_group(&fresh, 1));
        assert!(closes_tie_group(&fresh, 2));
    }

    #[test]
    fn selection_is_idempotent() {
        let batch = vec![post(5.0, "a"), post(6.0, "b")];
        let mark = ids(&["a"]);
        let first: Vec<Post> = select_new(&batch, &mark).into_iter().cloned().collect();
        let second: Vec<Post> = select_new(&batch, &mark).into_iter().cloned().collect();
        assert_eq!(first, second);
        assert_eq!(mark, ids(&["a"]));
    }
}
