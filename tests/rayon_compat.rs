#![cfg(feature = "rayon-compat")]

use pstd_par::ops::reduce;
use pstd_par::sort;
use rayon::prelude::*;

#[test]
fn sort_matches_rayon_par_sort_unstable() {
    let mut ours: Vec<i64> = (0..20_000).map(|i| (i * 2_654_435_761i64) % 104_729).collect();
    let mut theirs = ours.clone();
    sort::sort(&mut ours, i64::cmp);
    theirs.par_sort_unstable();
    assert_eq!(ours, theirs);
}

#[test]
fn stable_sort_matches_rayon_par_sort_by_key() {
    let mut ours: Vec<(i32, i32)> = (0..20_000).map(|i| (i % 13, i)).collect();
    let mut theirs = ours.clone();
    sort::stable_sort(&mut ours, |a, b| a.0.cmp(&b.0));
    theirs.par_sort_by_key(|x| x.0);
    assert_eq!(ours, theirs);
}

#[test]
fn sum_matches_rayon_par_iter_sum() {
    let data: Vec<i64> = (0..50_000).collect();
    let ours = reduce::sum(&data);
    let theirs: i64 = data.par_iter().sum();
    assert_eq!(ours, theirs);
}
