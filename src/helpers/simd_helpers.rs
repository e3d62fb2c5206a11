//! SIMD range scans over numeric columns.
//!
//! AVX2 when the CPU supports it, scalar otherwise. Null handling rides on
//! the comparison semantics: ordered float compares reject NaN, and the
//! i64 sentinel is rejected explicitly, so callers only ever see non-null
//! matches.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::{
    __m256i, _CMP_GE_OQ, _CMP_LE_OQ, _mm256_and_pd, _mm256_castsi256_pd, _mm256_cmp_pd,
    _mm256_cmpeq_epi64, _mm256_cmpgt_epi64, _mm256_loadu_pd, _mm256_loadu_si256,
    _mm256_movemask_pd, _mm256_or_si256, _mm256_set1_epi64x, _mm256_set1_pd,
};

use crate::table::column::NULL_I64;

#[inline]
pub fn in_range_f64(v: f64, lo: f64, hi: f64) -> bool {
    // NaN fails both comparisons, so nulls never match.
    v >= lo && v <= hi
}

#[inline]
pub fn in_range_i64(v: i64, lo: i64, hi: i64) -> bool {
    v != NULL_I64 && v >= lo && v <= hi
}

/// Indices of values inside the inclusive `[lo, hi]` range.
pub fn filter_range_f64(values: &[f64], lo: f64, hi: f64) -> Vec<usize> {
    #[cfg(target_arch = "x86_64")]
    if is_x86_feature_detected!("avx2") {
        return unsafe { filter_range_f64_avx2(values, lo, hi) };
    }
    filter_range_f64_scalar(values, lo, hi)
}

/// Indices of non-null values inside the inclusive `[lo, hi]` range.
pub fn filter_range_i64(values: &[i64], lo: i64, hi: i64) -> Vec<usize> {
    #[cfg(target_arch = "x86_64")]
    if is_x86_feature_detected!("avx2") {
        return unsafe { filter_range_i64_avx2(values, lo, hi) };
    }
    filter_range_i64_scalar(values, lo, hi)
}

fn filter_range_f64_scalar(values: &[f64], lo: f64, hi: f64) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, &v)| in_range_f64(v, lo, hi).then_some(i))
        .collect()
}

fn filter_range_i64_scalar(values: &[i64], lo: i64, hi: i64) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, &v)| in_range_i64(v, lo, hi).then_some(i))
        .collect()
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn filter_range_f64_avx2(values: &[f64], lo: f64, hi: f64) -> Vec<usize> {
    const LANES: usize = 4; // __m256d holds 4 f64
    let mut out = Vec::with_capacity(values.len());

    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();

    let lo_v = _mm256_set1_pd(lo);
    let hi_v = _mm256_set1_pd(hi);

    for (chunk_idx, chunk) in chunks.enumerate() {
        let v = unsafe { _mm256_loadu_pd(chunk.as_ptr()) };
        let ge = _mm256_cmp_pd::<_CMP_GE_OQ>(v, lo_v);
        let le = _mm256_cmp_pd::<_CMP_LE_OQ>(v, hi_v);
        let mask_bits = _mm256_movemask_pd(_mm256_and_pd(ge, le));
        for i in 0..LANES {
            if (mask_bits & (1 << i)) != 0 {
                out.push(chunk_idx * LANES + i);
            }
        }
    }

    let base = values.len() - remainder.len();
    for (i, &v) in remainder.iter().enumerate() {
        if in_range_f64(v, lo, hi) {
            out.push(base + i);
        }
    }

    out
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn filter_range_i64_avx2(values: &[i64], lo: i64, hi: i64) -> Vec<usize> {
    const LANES: usize = 4; // __m256i holds 4 i64
    let mut out = Vec::with_capacity(values.len());

    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();

    let lo_v = _mm256_set1_epi64x(lo);
    let hi_v = _mm256_set1_epi64x(hi);
    let null_v = _mm256_set1_epi64x(NULL_I64);

    for (chunk_idx, chunk) in chunks.enumerate() {
        let v = unsafe { _mm256_loadu_si256(chunk.as_ptr() as *const __m256i) };
        let below = _mm256_cmpgt_epi64(lo_v, v);
        let above = _mm256_cmpgt_epi64(v, hi_v);
        let is_null = _mm256_cmpeq_epi64(v, null_v);
        let reject = _mm256_or_si256(_mm256_or_si256(below, above), is_null);
        // trick: treat as f64 lanes so movemask yields one bit per i64
        let mask_bits = !_mm256_movemask_pd(_mm256_castsi256_pd(reject)) & 0b1111;
        for i in 0..LANES {
            if (mask_bits & (1 << i)) != 0 {
                out.push(chunk_idx * LANES + i);
            }
        }
    }

    let base = values.len() - remainder.len();
    for (i, &v) in remainder.iter().enumerate() {
        if in_range_i64(v, lo, hi) {
            out.push(base + i);
        }
    }

    out
}
