//! Chunk boundaries and numbering.

use rstest::rstest;

use crate::domain::{BatchSize, chunk_count, partition};
use crate::test_support::recap_rows;

#[rstest]
fn splits_in_order_with_a_short_tail() {
    let rows = recap_rows(25_000);
    let batch = BatchSize::new(10_000).expect("valid batch size");

    let chunks: Vec<_> = partition(&rows, batch)
        .map(|chunk| (chunk.number(), chunk.first_row_number, chunk.rows.len()))
        .collect();

    assert_eq!(
        chunks,
        vec![(1, 1, 10_000), (2, 10_001, 10_000), (3, 20_001, 5_000)]
    );
    assert_eq!(chunk_count(rows.len(), batch), 3);
}

#[rstest]
#[case(0, 3, 0)]
#[case(1, 3, 1)]
#[case(3, 3, 1)]
#[case(4, 3, 2)]
fn chunk_count_rounds_up(#[case] rows: usize, #[case] batch: usize, #[case] expected: usize) {
    let batch = BatchSize::new(batch).expect("valid batch size");
    assert_eq!(chunk_count(rows, batch), expected);
    assert_eq!(partition(&recap_rows(rows), batch).count(), expected);
}

#[rstest]
fn chunk_knows_its_last_row() {
    let rows = recap_rows(7);
    let batch = BatchSize::new(3).expect("valid batch size");

    let last_rows: Vec<_> = partition(&rows, batch)
        .map(|chunk| chunk.last_row_number())
        .collect();

    assert_eq!(last_rows, vec![3, 6, 7]);
}
