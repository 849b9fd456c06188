// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::cmp::Ordering;
use std::sync::Arc;

use arrow_array::types::Int32Type;
use arrow_array::{
    Array, ArrayRef, DictionaryArray, Int32Array, Int64Array, ListArray, RecordBatch, StringArray,
};
use arrow_cast::pretty::pretty_format_batches;
use arrow_schema::DataType;
use lakesoul_transfer::batch::{BatchStats, BatchTracker};
use lakesoul_transfer::{Batch, SortingColumn, TransferError, merge};
use rand::Rng;

fn assert_batch_eq(expected: &[&str], batch: &Batch) {
    let formatted = pretty_format_batches(&[batch.record_batch().clone()])
        .unwrap()
        .to_string();
    let actual = formatted.trim().lines().collect::<Vec<_>>();
    assert_eq!(expected, actual.as_slice(), "\n\nexpected:\n{expected:#?}\nactual:\n{actual:#?}\n");
}

fn create_batch_day(days: Vec<&str>, src: i32) -> Batch {
    let len = days.len();
    Batch::new(
        RecordBatch::try_from_iter(vec![
            ("day", Arc::new(StringArray::from(days)) as ArrayRef),
            ("src", Arc::new(Int32Array::from(vec![src; len])) as ArrayRef),
        ])
        .unwrap(),
    )
}

fn create_batch_one_col_i32(values: Vec<Option<i32>>) -> Batch {
    Batch::new(RecordBatch::try_from_iter(vec![("a", Arc::new(Int32Array::from(values)) as ArrayRef)]).unwrap())
}

fn i32_values(batch: &Batch, column: usize) -> Vec<Option<i32>> {
    batch
        .column(column)
        .as_any()
        .downcast_ref::<Int32Array>()
        .unwrap()
        .iter()
        .collect()
}

#[test_log::test]
fn test_merge_days() {
    let batches = vec![
        create_batch_day(vec!["Mon", "Tue", "Wed"], 0),
        create_batch_day(vec!["Mon", "Tue"], 1),
        create_batch_day(vec!["Wed", "Thu"], 2),
    ];
    let merged = merge(batches, &[SortingColumn::asc(0)], 0).unwrap();
    assert_batch_eq(
        &[
            "+-----+-----+",
            "| day | src |",
            "+-----+-----+",
            "| Mon | 0   |",
            "| Mon | 1   |",
            "| Tue | 0   |",
            "| Tue | 1   |",
            "| Wed | 0   |",
            "| Wed | 2   |",
            "| Thu | 2   |",
            "+-----+-----+",
        ],
        &merged,
    );
}

#[test_log::test]
fn test_merge_days_with_limit() {
    let batches = vec![
        create_batch_day(vec!["Mon", "Tue", "Wed"], 0),
        create_batch_day(vec!["Mon", "Tue"], 1),
        create_batch_day(vec!["Wed", "Thu"], 2),
    ];
    let merged = merge(batches, &[SortingColumn::asc(0)], 3).unwrap();
    assert_batch_eq(
        &[
            "+-----+-----+",
            "| day | src |",
            "+-----+-----+",
            "| Mon | 0   |",
            "| Mon | 1   |",
            "| Tue | 0   |",
            "+-----+-----+",
        ],
        &merged,
    );

    // a limit above the row count returns everything
    let merged = merge(vec![create_batch_day(vec!["Mon"], 0)], &[SortingColumn::asc(0)], 10).unwrap();
    assert_eq!(merged.num_rows(), 1);
}

#[test]
fn test_merge_without_batches() {
    let err = merge(vec![], &[SortingColumn::asc(0)], 0).unwrap_err();
    assert!(matches!(err, TransferError::NoRecordsProvided));
    assert_eq!(err.to_string(), "no records provided");
}

#[test]
fn test_merge_zero_row_inputs() {
    let merged = merge(
        vec![
            create_batch_one_col_i32(vec![]),
            create_batch_one_col_i32(vec![Some(1), Some(4)]),
            create_batch_one_col_i32(vec![]),
            create_batch_one_col_i32(vec![Some(2)]),
        ],
        &[SortingColumn::asc(0)],
        0,
    )
    .unwrap();
    assert_eq!(i32_values(&merged, 0), vec![Some(1), Some(2), Some(4)]);

    let merged = merge(vec![create_batch_one_col_i32(vec![])], &[SortingColumn::asc(0)], 0).unwrap();
    assert_eq!(merged.num_rows(), 0);
    assert_eq!(merged.num_columns(), 1);
}

#[test]
fn test_merge_null_ordering() {
    let cases = [
        (
            SortingColumn::asc(0).with_nulls_first(true),
            vec![vec![None, Some(1), Some(3)], vec![None, Some(2)]],
            vec![None, None, Some(1), Some(2), Some(3)],
        ),
        (
            SortingColumn::desc(0).with_nulls_first(true),
            vec![vec![None, Some(3), Some(1)], vec![None, Some(2)]],
            vec![None, None, Some(3), Some(2), Some(1)],
        ),
        (
            SortingColumn::asc(0),
            vec![vec![Some(1), Some(3), None], vec![Some(2), None]],
            vec![Some(1), Some(2), Some(3), None, None],
        ),
        (
            SortingColumn::desc(0),
            vec![vec![Some(3), Some(1), None], vec![Some(2), None]],
            vec![Some(3), Some(2), Some(1), None, None],
        ),
    ];
    for (key, inputs, expected) in cases {
        let batches = inputs.into_iter().map(create_batch_one_col_i32).collect();
        let merged = merge(batches, &[key], 0).unwrap();
        assert_eq!(i32_values(&merged, 0), expected, "key {key:?}");
    }
}

#[test]
fn test_merge_multiple_keys() {
    let batch = |days: Vec<&str>, values: Vec<i64>| {
        Batch::new(
            RecordBatch::try_from_iter(vec![
                ("day", Arc::new(StringArray::from(days)) as ArrayRef),
                ("v", Arc::new(Int64Array::from(values)) as ArrayRef),
            ])
            .unwrap(),
        )
    };
    let merged = merge(
        vec![
            batch(vec!["a", "a", "b"], vec![9, 1, 5]),
            batch(vec!["a", "b", "b"], vec![4, 7, 2]),
        ],
        &[SortingColumn::asc(0), SortingColumn::desc(1)],
        0,
    )
    .unwrap();
    assert_batch_eq(
        &[
            "+-----+---+",
            "| day | v |",
            "+-----+---+",
            "| a   | 9 |",
            "| a   | 4 |",
            "| a   | 1 |",
            "| b   | 7 |",
            "| b   | 5 |",
            "| b   | 2 |",
            "+-----+---+",
        ],
        &merged,
    );
}

#[test]
fn test_merge_dictionary_equivalence() {
    let plain = |values: Vec<&str>| {
        Batch::new(RecordBatch::try_from_iter(vec![("s", Arc::new(StringArray::from(values)) as ArrayRef)]).unwrap())
    };
    let dictionary = |values: Vec<&str>| {
        let array: DictionaryArray<Int32Type> = values.into_iter().collect();
        Batch::new(RecordBatch::try_from_iter(vec![("s", Arc::new(array) as ArrayRef)]).unwrap())
    };
    let key = [SortingColumn::asc(0)];
    let expected = merge(vec![plain(vec!["a", "c", "e"]), plain(vec!["b", "c", "d"])], &key, 0).unwrap();

    let mixed = merge(vec![plain(vec!["a", "c", "e"]), dictionary(vec!["b", "c", "d"])], &key, 0).unwrap();
    assert_eq!(mixed.record_batch(), expected.record_batch());

    // the output keeps the first input's encoding
    let mixed = merge(vec![dictionary(vec!["a", "c", "e"]), plain(vec!["b", "c", "d"])], &key, 0).unwrap();
    assert!(matches!(mixed.schema().field(0).data_type(), DataType::Dictionary(_, _)));
    assert_eq!(
        pretty_format_batches(&[mixed.record_batch().clone()]).unwrap().to_string(),
        pretty_format_batches(&[expected.record_batch().clone()]).unwrap().to_string()
    );
}

#[test]
fn test_merge_casts_without_loss() {
    let wide = |values: Vec<i64>| {
        Batch::new(RecordBatch::try_from_iter(vec![("a", Arc::new(Int64Array::from(values)) as ArrayRef)]).unwrap())
    };
    let key = [SortingColumn::asc(0)];

    // values that fit the first input's type are kept
    let merged = merge(vec![create_batch_one_col_i32(vec![Some(1), Some(4)]), wide(vec![2, 3])], &key, 0).unwrap();
    assert_eq!(i32_values(&merged, 0), vec![Some(1), Some(2), Some(3), Some(4)]);

    // values that do not fit fail instead of turning into nulls
    let err = merge(
        vec![create_batch_one_col_i32(vec![Some(1), Some(2)]), wide(vec![5_000_000_000])],
        &key,
        0,
    )
    .unwrap_err();
    assert!(matches!(err, TransferError::SchemaMismatch(_)), "{err}");

    let payload = |key: i32, payload: ArrayRef| {
        Batch::new(
            RecordBatch::try_from_iter(vec![("k", Arc::new(Int32Array::from(vec![key])) as ArrayRef), ("p", payload)])
                .unwrap(),
        )
    };
    let err = merge(
        vec![
            payload(1, Arc::new(Int32Array::from(vec![7]))),
            payload(2, Arc::new(StringArray::from(vec!["hello"]))),
        ],
        &key,
        0,
    )
    .unwrap_err();
    assert!(matches!(err, TransferError::SchemaMismatch(_)), "{err}");
    assert!(err.to_string().contains("column 1 of input 1"), "{err}");
}

#[test]
fn test_merge_unsupported_type() {
    let list = ListArray::from_iter_primitive::<Int32Type, _, _>(vec![Some(vec![Some(1)]), None]);
    let batch = Batch::new(RecordBatch::try_from_iter(vec![("l", Arc::new(list) as ArrayRef)]).unwrap());
    let err = merge(vec![batch], &[SortingColumn::asc(0)], 0).unwrap_err();
    assert!(matches!(err, TransferError::UnsupportedSortType { column: 0, .. }));
}

#[test]
fn test_merge_releases_inputs() {
    let tracker = BatchTracker::new();
    let batches = (0..4)
        .map(|i| {
            let record =
                RecordBatch::try_from_iter(vec![("a", Arc::new(Int32Array::from(vec![i, i + 10])) as ArrayRef)])
                    .unwrap();
            tracker.track(record)
        })
        .collect::<Vec<_>>();
    let merged = merge(batches, &[SortingColumn::asc(0)], 0).unwrap();
    assert_eq!(merged.num_rows(), 8);
    assert_eq!(tracker.retained(), 4);
    assert_eq!(tracker.outstanding(), 0);
}

type Row = (i32, Option<String>);

/// `a` ascending, then `b` descending with nulls first.
fn cmp_rows(l: &Row, r: &Row) -> Ordering {
    l.0.cmp(&r.0).then_with(|| match (&l.1, &r.1) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => y.cmp(x),
    })
}

fn rows_to_batch(rows: &[Row]) -> Batch {
    let a = Int32Array::from(rows.iter().map(|r| r.0).collect::<Vec<_>>());
    let b = StringArray::from(rows.iter().map(|r| r.1.clone()).collect::<Vec<_>>());
    Batch::new(
        RecordBatch::try_from_iter(vec![("a", Arc::new(a) as ArrayRef), ("b", Arc::new(b) as ArrayRef)]).unwrap(),
    )
}

fn batch_to_rows(batch: &Batch) -> Vec<Row> {
    let a = batch.column(0).as_any().downcast_ref::<Int32Array>().unwrap();
    let b = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
    a.iter()
        .zip(b.iter())
        .map(|(a, b)| (a.unwrap(), b.map(str::to_string)))
        .collect()
}

#[test]
fn test_merge_random_sorted_inputs() {
    let mut rng = rand::rng();
    let keys = [SortingColumn::asc(0), SortingColumn::desc(1).with_nulls_first(true)];
    for _ in 0..50 {
        let num_inputs = rng.random_range(1..6);
        let inputs = (0..num_inputs)
            .map(|_| {
                let len = rng.random_range(0..20);
                let mut rows = (0..len)
                    .map(|_| {
                        let b = if rng.random_bool(0.2) {
                            None
                        } else {
                            Some(format!("{}", rng.random_range(0..5)))
                        };
                        (rng.random_range(0..5), b)
                    })
                    .collect::<Vec<Row>>();
                rows.sort_by(cmp_rows);
                rows
            })
            .collect::<Vec<_>>();
        let total = inputs.iter().map(Vec::len).sum::<usize>();

        let merged = merge(inputs.iter().map(|rows| rows_to_batch(rows)).collect(), &keys, 0).unwrap();
        let rows = batch_to_rows(&merged);
        assert_eq!(rows.len(), total);
        assert!(rows.windows(2).all(|w| cmp_rows(&w[0], &w[1]) != Ordering::Greater));

        let mut expected = inputs.concat();
        let mut actual = rows.clone();
        expected.sort();
        actual.sort();
        assert_eq!(actual, expected);

        if total > 0 {
            let limit = rng.random_range(1..=total);
            let limited = merge(inputs.iter().map(|rows| rows_to_batch(rows)).collect(), &keys, limit).unwrap();
            assert_eq!(batch_to_rows(&limited), rows[..limit].to_vec());
        }
    }
}
