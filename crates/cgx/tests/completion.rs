use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cgx::Gx;
use cgx::hw::PixelEngine;
use cgx::reg::pix::InterruptStatus;
use cgx::soft::SoftGpu;
use cgx::sync::{Completion, Phase};

#[derive(Default)]
struct Status(InterruptStatus);

impl PixelEngine for Status {
    fn read_interrupt(&self) -> InterruptStatus {
        self.0
    }

    fn write_interrupt(&mut self, value: InterruptStatus) {
        self.0.write(value);
    }
}

#[test]
fn every_wait_returns_after_its_own_signal() {
    const CYCLES: u64 = 200;

    let completion = Arc::new(Completion::new());
    let (fire, fired) = flume::unbounded::<u64>();
    let interrupt = thread::spawn({
        let completion = completion.clone();
        move || {
            let mut pe = Status::default();
            while let Ok(cycle) = fired.recv() {
                if cycle % 3 == 0 {
                    thread::yield_now();
                }

                completion.signal(&mut pe);
            }
        }
    });

    for cycle in 1..=CYCLES {
        let pending = completion.arm(&mut Vec::<u8>::new());
        assert_eq!(pending.cycle(), cycle);
        assert_eq!(completion.phase(), Phase::Armed);

        fire.send(cycle).unwrap();
        if cycle % 2 == 0 {
            thread::yield_now();
        }

        pending.wait();
        assert_eq!(completion.phase(), Phase::Signaled);
        assert_eq!(completion.signals(), cycle);
    }

    drop(fire);
    interrupt.join().unwrap();
    assert_eq!(completion.cycles(), CYCLES);
}

#[test]
fn wait_does_not_return_before_the_signal() {
    let completion = Arc::new(Completion::new());
    let pending = completion.arm(&mut Vec::<u8>::new());
    let (release, released) = flume::bounded::<()>(0);

    let interrupt = thread::spawn({
        let completion = completion.clone();
        move || {
            released.recv().unwrap();
            completion.signal(&mut Status::default());
        }
    });

    thread::sleep(Duration::from_millis(20));
    assert!(!pending.is_finished());
    release.send(()).unwrap();

    pending.wait();
    interrupt.join().unwrap();
    assert_eq!(completion.signals(), 1);
}

#[test]
fn gpu_round_trips() {
    let mut gx = Gx::init(SoftGpu::new());

    for round in 1..=64 {
        gx.force_pipeline_flush();
        gx.wait_for_gpu();

        assert_eq!(gx.completion().signals(), round);
        assert_eq!(gx.backend().registers().done, round);
    }

    let status = gx.backend().interrupt_status();
    assert!(status.finish_enabled());
    assert!(status.token_enabled());
    assert!(!status.finish());
}
