//! Background periodic work with an explicit lifecycle.

// std
use std::{
	ops::ControlFlow,
	sync::atomic::{AtomicU64, Ordering},
	time::Duration as StdDuration,
};
// crates.io
use tokio::{
	runtime::Handle,
	task::{AbortHandle, JoinHandle},
	time::{self, Instant, MissedTickBehavior},
};
// self
use crate::_prelude::*;

/// Runs a callback every `period` on a Tokio runtime until it breaks or is stopped.
///
/// The first tick happens one full period after spawning. Dropping the value leaves the task
/// running; call [`stop`](Self::stop) to cancel it.
#[derive(Debug)]
pub struct RepeatingTask {
	handle: JoinHandle<()>,
	ticks: Arc<AtomicU64>,
}
impl RepeatingTask {
	/// Spawns `tick` on `runtime`.
	pub fn spawn<F>(runtime: &Handle, period: StdDuration, mut tick: F) -> Self
	where
		F: 'static + Send + FnMut() -> ControlFlow<()>,
	{
		let ticks = Arc::new(AtomicU64::new(0));
		let counter = ticks.clone();
		let handle = runtime.spawn(async move {
			let mut interval = time::interval_at(Instant::now() + period, period);

			interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				interval.tick().await;
				counter.fetch_add(1, Ordering::Relaxed);

				if tick().is_break() {
					break;
				}
			}
		});

		Self { handle, ticks }
	}

	/// Cancels the task; the callback is not invoked again.
	pub fn stop(&self) {
		self.handle.abort();
	}

	/// Handle that cancels the task without owning it.
	pub fn abort_handle(&self) -> AbortHandle {
		self.handle.abort_handle()
	}

	/// Whether the task is still scheduled.
	pub fn is_running(&self) -> bool {
		!self.handle.is_finished()
	}

	/// Number of ticks observed so far.
	pub fn ticks(&self) -> u64 {
		self.ticks.load(Ordering::Relaxed)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn breaks_end_the_task() {
		let task = RepeatingTask::spawn(&Handle::current(), StdDuration::from_millis(100), {
			let mut remaining = 3;

			move || {
				remaining -= 1;

				if remaining == 0 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
			}
		});

		time::sleep(StdDuration::from_secs(1)).await;

		assert_eq!(task.ticks(), 3);
		assert!(!task.is_running());
	}

	#[tokio::test(start_paused = true)]
	async fn first_tick_waits_one_period_and_stop_cancels() {
		let task = RepeatingTask::spawn(&Handle::current(), StdDuration::from_millis(100), || {
			ControlFlow::Continue(())
		});

		time::sleep(StdDuration::from_millis(50)).await;

		assert_eq!(task.ticks(), 0);

		time::sleep(StdDuration::from_millis(200)).await;

		assert_eq!(task.ticks(), 2);

		task.stop();
		time::sleep(StdDuration::from_secs(1)).await;

		assert_eq!(task.ticks(), 2);
		assert!(!task.is_running());
	}
}
