use pingscope_core::sequence::{unwrap_sequences, SequenceUnwrapper};
use pingscope_core::types::{RawSample, Timestamp, DEFAULT_WRAP_PERIOD};
use proptest::prelude::*;

fn sample(i: u64, sequence: u32, latency: f64) -> RawSample {
	RawSample { timestamp: Timestamp::from_micros(i as i64 * 1_000_000), sequence, latency }
}

#[test]
fn wrap_scenario_from_live_log() {
	let out = unwrap_sequences(
		[sample(0, 65534, 20.0), sample(1, 65535, f64::INFINITY), sample(2, 1, 21.0)],
		DEFAULT_WRAP_PERIOD,
	);
	let seqs: Vec<u64> = out.iter().map(|s| s.sequence).collect();
	assert_eq!(seqs, vec![65534, 65535, 65537]);
	assert!(out[1].latency.is_infinite());
}

#[test]
fn first_zero_keeps_offset_at_zero() {
	let mut u = SequenceUnwrapper::default();
	assert_eq!(u.push(sample(0, 0, 1.0)), 0);
	assert_eq!(u.push(sample(1, 1, 1.0)), 1);
	assert_eq!(u.len(), 2);
}

proptest! {
	// A counter running across several wraps, each device number seen once;
	// zeros may be missing from the log.
	#[test]
	fn unwrapped_sequence_tracks_counter(
		period in 8u64..64,
		start_frac in 0.0f64..1.0,
		len in 1usize..300,
		drop_zero in proptest::collection::vec(any::<bool>(), 300),
	) {
		let start = (start_frac * period as f64) as u64;
		let mut u = SequenceUnwrapper::new(period);
		let mut expected = Vec::new();
		let mut device = Vec::new();
		for (i, counter) in (start..start + len as u64).enumerate() {
			let seq = (counter % period) as u32;
			if seq == 0 && drop_zero[i] && i > 0 { continue; }
			u.push(sample(i as u64, seq, i as f64));
			expected.push(counter);
			device.push(u64::from(seq));
		}
		let out = u.finish();
		let logical: Vec<u64> = out.iter().map(|s| s.sequence).collect();
		prop_assert_eq!(&logical, &expected);
		prop_assert!(logical.windows(2).all(|w| w[0] < w[1]));
		for (l, d) in logical.iter().zip(&device) {
			prop_assert_eq!(l % period, *d);
		}
	}
}
