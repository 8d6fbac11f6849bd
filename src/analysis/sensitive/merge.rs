//! 候选片段合并
//!
//! 多个识别器产生的候选片段可以任意重叠，合并后保证：按 `start` 升序、
//! 两两不重叠、每个片段都原样来自候选集合（不截断、不拼接、不改置信度）。
//! 排序键是全序，因此无论输入顺序如何，输出都完全一致。

use std::cmp::Ordering;

use super::result::Span;

/// 默认置信度阈值
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.7;

/// 比较两个片段的优先级，`Less` 表示 `a` 优先
///
/// 依次比较：置信度降序、字符长度降序、方法优先级、实体类型。
pub fn rank(a: &Span, b: &Span) -> Ordering {
    b.confidence()
        .total_cmp(&a.confidence())
        .then_with(|| b.char_len().cmp(&a.char_len()))
        .then_with(|| a.method().priority().cmp(&b.method().priority()))
        .then_with(|| a.method().cmp(b.method()))
        .then_with(|| a.entity_type().cmp(b.entity_type()))
}

/// `a` 是否严格优先于 `b`
pub fn outranks(a: &Span, b: &Span) -> bool {
    rank(a, b) == Ordering::Less
}

fn sweep_order(a: &Span, b: &Span) -> Ordering {
    a.start()
        .cmp(&b.start())
        .then_with(|| rank(a, b))
        .then_with(|| a.end().cmp(&b.end()))
}

/// 合并候选片段
pub fn merge<I>(candidates: I, min_confidence: f32) -> Vec<Span>
where
    I: IntoIterator<Item = Span>,
{
    let mut total = 0usize;
    let mut sorted: Vec<Span> = candidates
        .into_iter()
        .inspect(|_| total += 1)
        .filter(|span| span.confidence() >= min_confidence)
        .collect();
    let below_threshold = total - sorted.len();

    sorted.sort_by(sweep_order);

    let mut accepted: Vec<Span> = Vec::with_capacity(sorted.len());
    let mut overlap_losers = 0usize;

    for candidate in sorted {
        // 已接受的片段按 start 有序且互不重叠，只可能与最后一个重叠
        match accepted.last_mut() {
            Some(last) if candidate.start() < last.end() => {
                if outranks(&candidate, last) {
                    *last = candidate;
                }
                overlap_losers += 1;
            }
            _ => accepted.push(candidate),
        }
    }

    collapse_duplicate_bounds(&mut accepted);

    tracing::debug!(
        candidates = total,
        below_threshold,
        overlap_losers,
        accepted = accepted.len(),
        "Merged candidate spans"
    );

    accepted
}

/// 相同边界、不同类型的片段只保留优先级更高的一个
pub(crate) fn collapse_duplicate_bounds(spans: &mut Vec<Span>) {
    spans.dedup_by(|later, earlier| {
        if !later.same_bounds(earlier) {
            return false;
        }
        if outranks(later, earlier) {
            std::mem::swap(later, earlier);
        }
        true
    });
}

/// 检查片段序列是否按 start 有序且互不重叠
pub fn is_ordered_non_overlapping(spans: &[Span]) -> bool {
    spans.windows(2).all(|pair| pair[0].end() <= pair[1].start())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::sensitive::result::{DetectionMethod, EntityType};

    // 30 个字符的占位文本，偏移量可以随意选取
    const TEXT: &str = "abcdefghijklmnopqrstuvwxyz0123";

    fn span(start: usize, end: usize, entity: EntityType, confidence: f32, method: DetectionMethod) -> Span {
        Span::new(TEXT, start, end, entity, confidence, method).unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert!(merge(Vec::new(), DEFAULT_MIN_CONFIDENCE).is_empty());
    }

    #[test]
    fn test_non_overlapping_spans_are_kept_in_order() {
        let merged = merge(
            vec![
                span(10, 14, EntityType::Phone, 0.9, DetectionMethod::Regex),
                span(0, 4, EntityType::Email, 0.9, DetectionMethod::Regex),
            ],
            0.7,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].start(), 0);
        assert_eq!(merged[1].start(), 10);
    }

    #[test]
    fn test_threshold_filters_before_overlap_resolution() {
        let merged = merge(
            vec![
                span(12, 29, EntityType::Email, 0.9, DetectionMethod::Regex),
                span(12, 20, EntityType::Person, 0.6, DetectionMethod::Statistical),
            ],
            0.7,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(*merged[0].entity_type(), EntityType::Email);
    }

    #[test]
    fn test_higher_confidence_wins_overlap() {
        let merged = merge(
            vec![
                span(0, 10, EntityType::Date, 0.85, DetectionMethod::Regex),
                span(5, 20, EntityType::CreditCard, 0.93, DetectionMethod::Regex),
            ],
            0.7,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(*merged[0].entity_type(), EntityType::CreditCard);
        assert_eq!((merged[0].start(), merged[0].end()), (5, 20));
    }

    #[test]
    fn test_longer_span_wins_on_equal_confidence() {
        let merged = merge(
            vec![
                span(3, 8, EntityType::Date, 0.9, DetectionMethod::Regex),
                span(3, 19, EntityType::CreditCard, 0.9, DetectionMethod::Regex),
            ],
            0.7,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].end(), 19);
    }

    #[test]
    fn test_method_priority_breaks_exact_tie() {
        let merged = merge(
            vec![
                span(5, 10, EntityType::Organization, 0.9, DetectionMethod::Statistical),
                span(5, 10, EntityType::Email, 0.9, DetectionMethod::Regex),
            ],
            0.7,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(*merged[0].entity_type(), EntityType::Email);
        assert_eq!(*merged[0].method(), DetectionMethod::Regex);
    }

    #[test]
    fn test_loser_is_never_trimmed() {
        let merged = merge(
            vec![
                span(0, 6, EntityType::Person, 0.95, DetectionMethod::Statistical),
                span(4, 15, EntityType::Ssn, 0.88, DetectionMethod::Regex),
            ],
            0.7,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!((merged[0].start(), merged[0].end()), (0, 6));
    }

    #[test]
    fn test_adjacent_spans_do_not_overlap() {
        let merged = merge(
            vec![
                span(0, 5, EntityType::Email, 0.9, DetectionMethod::Regex),
                span(5, 10, EntityType::Phone, 0.8, DetectionMethod::Regex),
            ],
            0.7,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_winner_chain_is_resolved_against_last_accepted() {
        let merged = merge(
            vec![
                span(0, 10, EntityType::Date, 0.8, DetectionMethod::Regex),
                span(8, 16, EntityType::Phone, 0.9, DetectionMethod::Regex),
                span(14, 20, EntityType::Ssn, 0.95, DetectionMethod::Regex),
                span(22, 25, EntityType::Email, 0.9, DetectionMethod::Regex),
            ],
            0.7,
        );
        let bounds: Vec<(usize, usize)> = merged.iter().map(|s| (s.start(), s.end())).collect();
        assert_eq!(bounds, vec![(14, 20), (22, 25)]);
        assert!(is_ordered_non_overlapping(&merged));
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let candidates = vec![
            span(0, 10, EntityType::Date, 0.85, DetectionMethod::Regex),
            span(0, 10, EntityType::Financial, 0.85, DetectionMethod::Regex),
            span(2, 12, EntityType::Person, 0.85, DetectionMethod::Statistical),
            span(15, 20, EntityType::Phone, 0.9, DetectionMethod::Regex),
            span(15, 20, EntityType::Ssn, 0.9, DetectionMethod::Regex),
        ];
        let forward = merge(candidates.clone(), 0.7);
        let mut reversed_input = candidates;
        reversed_input.reverse();
        let backward = merge(reversed_input, 0.7);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_collapse_duplicate_bounds_keeps_best() {
        let mut spans = vec![
            span(5, 10, EntityType::Organization, 0.9, DetectionMethod::Statistical),
            span(5, 10, EntityType::Email, 0.9, DetectionMethod::Regex),
            span(5, 10, EntityType::Person, 0.8, DetectionMethod::Statistical),
            span(12, 14, EntityType::Date, 0.9, DetectionMethod::Regex),
        ];
        collapse_duplicate_bounds(&mut spans);
        assert_eq!(spans.len(), 2);
        assert_eq!(*spans[0].entity_type(), EntityType::Email);
        assert_eq!(*spans[1].entity_type(), EntityType::Date);
    }

    #[test]
    fn test_confidence_is_preserved() {
        let merged = merge(vec![span(1, 4, EntityType::Person, 0.734, DetectionMethod::Statistical)], 0.7);
        assert_eq!(merged[0].confidence(), 0.734);
    }
}
