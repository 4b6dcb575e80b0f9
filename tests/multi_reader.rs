//! Lock-step multi-port reads with domains and producers at different rates
//!
//! Every port runs its own domain: wall-clock conversion applies each port's own
//! resolution and origin to its row, and a partial read keeps the columns of all
//! rows aligned.

use anyhow::Result;
use daq_reader::{
    DataDescriptor, DataRule, DomainMode, InputPort, MultiReader, PortConfig, Ratio, SampleType,
    Signal, SignalReader,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// 2000-01-01T00:00:00Z as nanoseconds since the Unix epoch.
const Y2K_NS: i64 = 946_684_800_000_000_000;

fn source(name: &str, domain: DataDescriptor) -> (Arc<Signal>, Arc<InputPort>) {
    let signal = Signal::new(DataDescriptor::values(name, SampleType::Float32), Some(domain));
    let port = InputPort::new(name);
    signal.connect(&port);
    (signal, port)
}

/// Millisecond ticks from the Unix epoch.
fn millis() -> DataDescriptor {
    DataDescriptor::linear_time(1, Ratio::new(1, 1_000).expect("ratio"))
}

/// Microsecond ticks in steps of 10 from 2000-01-01.
fn micros_since_y2k() -> DataDescriptor {
    DataDescriptor::builder()
        .name("time")
        .sample_type(SampleType::Int64)
        .rule(DataRule::Linear { delta: 10, start: 0 })
        .tick_resolution(Ratio::new(1, 1_000_000).expect("ratio"))
        .origin("2000-01-01T00:00:00Z")
        .build()
        .expect("descriptor")
}

#[test]
fn wall_clock_rows_use_each_ports_resolution_and_origin() -> Result<()> {
    let (a, pa) = source("a", millis());
    let (b, pb) = source("b", micros_since_y2k());
    let mut reader = MultiReader::from_config(
        &PortConfig::multi(&[pa, pb]).with_domain_mode(DomainMode::WallClock),
    )?;

    a.send_with_offset(vec![1.0f32, 2.0, 3.0], 10)?;
    b.send_with_offset(vec![10.0f32, 20.0], 5)?;

    // Port b bounds the aligned subset.
    let read = reader.read_with_domain(3, 0)?;
    assert!(!read.status.is_complete());
    assert_eq!(read.status.samples_read(), 2);
    assert_eq!(read.values.shape(), &[2, 2]);
    assert_eq!(read.domain.shape(), &[2, 2]);
    assert_eq!(read.domain.strides(), &[24, 8]);
    assert!(read.domain.is_datetime());

    assert_eq!(read.values.get::<f32>(&[0, 1]), Some(2.0));
    assert_eq!(read.values.get::<f32>(&[1, 1]), Some(20.0));
    assert_eq!(read.domain.get::<i64>(&[0, 0]), Some(10_000_000));
    assert_eq!(read.domain.get::<i64>(&[0, 1]), Some(11_000_000));
    assert_eq!(read.domain.get::<i64>(&[1, 0]), Some(Y2K_NS + 5_000));
    assert_eq!(read.domain.get::<i64>(&[1, 1]), Some(Y2K_NS + 15_000));

    // Port a's third sample waited for its partner.
    b.send_with_offset(vec![30.0f32], 25)?;
    let read = reader.read_with_domain(1, 0)?;
    assert!(read.status.is_complete());
    assert_eq!(read.values.get::<f32>(&[0, 0]), Some(3.0));
    assert_eq!(read.domain.get::<i64>(&[0, 0]), Some(12_000_000));
    assert_eq!(read.domain.get::<i64>(&[1, 0]), Some(Y2K_NS + 25_000));
    assert_eq!(reader.samples_read(), 3);
    Ok(())
}

#[test]
fn native_domain_rows_are_contiguous_per_port() -> Result<()> {
    let (a, pa) = source("a", millis());
    let (b, pb) = source("b", micros_since_y2k());
    let mut reader = MultiReader::new(&[pa, pb])?;

    a.send_with_offset(vec![1.0f32, 2.0], 100)?;
    b.send_with_offset(vec![5.0f32, 6.0], 7)?;

    let read = reader.read_with_domain(2, 0)?;
    assert!(read.status.is_complete());
    assert_eq!(read.domain.sample_type(), Some(SampleType::Int64));
    assert!(!read.domain.is_datetime());
    assert_eq!(read.domain.shape(), read.values.shape());
    assert_eq!(read.domain.to_vec::<i64>(), vec![100, 101, 7, 17]);
    assert_eq!(read.values.to_vec::<f32>(), vec![1.0, 2.0, 5.0, 6.0]);
    Ok(())
}

#[test]
fn slow_port_bounds_the_aligned_subset_at_the_deadline() -> Result<()> {
    let (fast, pf) = source("fast", millis());
    let (slow, ps) = source("slow", millis());
    let mut reader = MultiReader::new(&[pf, ps])?;

    let fast_producer = {
        let fast = Arc::clone(&fast);
        thread::spawn(move || {
            for chunk in 0..5u8 {
                let start = f32::from(chunk) * 20.0;
                fast.send_values((0..20u8).map(|k| start + f32::from(k)).collect::<Vec<f32>>());
                thread::sleep(Duration::from_millis(2));
            }
        })
    };
    let slow_producer = {
        let slow = Arc::clone(&slow);
        thread::spawn(move || {
            for k in 0..10u8 {
                thread::sleep(Duration::from_millis(10));
                slow.send_values(vec![1000.0 + f32::from(k)]);
            }
        })
    };

    let started = Instant::now();
    let read = reader.read(50, 800)?;
    let elapsed = started.elapsed();
    fast_producer.join().expect("fast producer");
    slow_producer.join().expect("slow producer");

    assert!(elapsed >= Duration::from_millis(800));
    assert!(!read.status.is_complete());
    assert_eq!(read.status.samples_read(), 10);
    assert_eq!(read.values.shape(), &[2, 10]);
    for k in 0..10u8 {
        let col = usize::from(k);
        assert_eq!(read.values.get::<f32>(&[0, col]), Some(f32::from(k)));
        assert_eq!(read.values.get::<f32>(&[1, col]), Some(1000.0 + f32::from(k)));
    }

    // The fast port's surplus stayed queued, in order.
    slow.send_values((10..50u8).map(|k| 1000.0 + f32::from(k)).collect::<Vec<f32>>());
    let read = reader.read(40, 0)?;
    assert!(read.status.is_complete());
    assert_eq!(read.values.get::<f32>(&[0, 0]), Some(10.0));
    assert_eq!(read.values.get::<f32>(&[0, 39]), Some(49.0));
    assert_eq!(read.values.get::<f32>(&[1, 39]), Some(1049.0));
    Ok(())
}
