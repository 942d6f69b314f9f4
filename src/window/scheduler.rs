//! Redraw scheduler
//!
//! Each window owns a small calloop loop on its own thread. It holds the
//! native waker, forwards client wakeups to it, and runs the one-shot
//! timer behind delayed redraws.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use calloop::channel::{self, Channel};
use calloop::ping::{self, Ping};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopHandle, LoopSignal, RegistrationToken};
use crossbeam_channel::{bounded, Sender};
use log::{debug, error};

use crate::error::Error;
use crate::platform::Waker;

/// Requests to the scheduler thread
#[derive(Debug)]
pub(crate) enum Schedule {
    /// Replace the native waker; `None` while unrealized
    Waker(Option<Waker>),
    /// Post a redraw at this instant, replacing any earlier request
    RedrawAt(Instant),
}

struct State {
    handle: LoopHandle<'static, State>,
    signal: LoopSignal,
    waker: Option<Waker>,
    timer: Option<RegistrationToken>,
    redraws: Sender<()>,
}

impl State {
    fn arm(&mut self, at: Instant) {
        if let Some(token) = self.timer.take() {
            self.handle.remove(token);
        }
        let timer = Timer::from_deadline(at);
        match self.handle.insert_source(timer, |_, _, state: &mut State| {
            state.timer = None;
            state.fire();
            TimeoutAction::Drop
        }) {
            Ok(token) => self.timer = Some(token),
            Err(e) => error!("Failed to arm redraw timer: {}", e.error),
        }
    }

    fn fire(&mut self) {
        // A full queue already carries a redraw and its wakeup
        if self.redraws.try_send(()).is_ok() {
            self.wake();
        }
    }

    fn wake(&self) {
        if let Some(waker) = &self.waker {
            waker.wake();
        }
    }
}

/// Handle to a window's scheduler thread; stops and joins it on drop
pub(crate) struct Scheduler {
    tx: Option<channel::Sender<Schedule>>,
    ping: Ping,
    thread: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Start the thread; redraws are posted to `redraws`
    pub fn spawn(redraws: Sender<()>) -> Result<Self, Error> {
        let (ready_tx, ready_rx) = bounded(1);
        let thread = thread::Builder::new()
            .name("casement-scheduler".into())
            .spawn(move || {
                let (tx, rx) = channel::channel();
                let setup = ping::make_ping()
                    .map_err(Error::from)
                    .and_then(|(ping, source)| build(rx, source, redraws).map(|l| (l, ping)));
                match setup {
                    Ok(((mut event_loop, mut state), ping)) => {
                        let _ = ready_tx.send(Ok((tx, ping)));
                        run(&mut event_loop, &mut state);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok((tx, ping))) => Ok(Self {
                tx: Some(tx),
                ping,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(Error::EventLoop("scheduler thread died".into())),
        }
    }

    pub fn set_waker(&self, waker: Option<Waker>) {
        self.send(Schedule::Waker(waker));
    }

    pub fn redraw_at(&self, at: Instant) {
        self.send(Schedule::RedrawAt(at));
    }

    /// Wakes the native loop through the scheduler thread
    pub fn ping(&self) -> Ping {
        self.ping.clone()
    }

    fn send(&self, msg: Schedule) {
        if let Some(tx) = &self.tx {
            if tx.send(msg).is_err() {
                debug!("Scheduler already stopped");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Closing the channel stops the loop
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Scheduler thread panicked");
            }
        }
    }
}

type SchedulerLoop = EventLoop<'static, State>;

fn build(
    rx: Channel<Schedule>,
    ping: ping::PingSource,
    redraws: Sender<()>,
) -> Result<(SchedulerLoop, State), Error> {
    let event_loop: SchedulerLoop = EventLoop::try_new()?;
    let handle = event_loop.handle();

    handle
        .insert_source(rx, |event, _, state: &mut State| match event {
            channel::Event::Msg(Schedule::Waker(waker)) => state.waker = waker,
            channel::Event::Msg(Schedule::RedrawAt(at)) => state.arm(at),
            channel::Event::Closed => state.signal.stop(),
        })
        .map_err(|e| Error::from(e.error))?;

    handle
        .insert_source(ping, |_, _, state: &mut State| state.wake())
        .map_err(|e| Error::from(e.error))?;

    let state = State {
        handle: handle.clone(),
        signal: event_loop.get_signal(),
        waker: None,
        timer: None,
        redraws,
    };
    Ok((event_loop, state))
}

fn run(event_loop: &mut SchedulerLoop, state: &mut State) {
    debug!("Starting scheduler loop");
    let timeout: Option<Duration> = None;
    if let Err(e) = event_loop.run(timeout, state, |_| {}) {
        error!("Scheduler loop error: {}", e);
    }
    debug!("Scheduler loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_waker() -> (Waker, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let waker = {
            let count = count.clone();
            Waker::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        (waker, count)
    }

    #[test]
    fn test_timer_posts_redraw_and_wakes() {
        let (tx, rx) = bounded(1);
        let scheduler = Scheduler::spawn(tx).unwrap();
        let (waker, count) = counting_waker();
        scheduler.set_waker(Some(waker));
        scheduler.redraw_at(Instant::now() + Duration::from_millis(10));

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        // The wake follows the redraw on the scheduler thread
        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_newer_request_replaces_timer() {
        let (tx, rx) = bounded(1);
        let scheduler = Scheduler::spawn(tx).unwrap();
        scheduler.redraw_at(Instant::now() + Duration::from_secs(3600));
        scheduler.redraw_at(Instant::now() + Duration::from_millis(10));
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_ping_reaches_waker() {
        let (tx, _rx) = bounded(1);
        let scheduler = Scheduler::spawn(tx).unwrap();
        let (waker, count) = counting_waker();
        scheduler.set_waker(Some(waker));
        // Let the waker message land before pinging
        thread::sleep(Duration::from_millis(20));
        scheduler.ping().ping();
        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(count.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_drop_joins_thread() {
        let (tx, _rx) = bounded(1);
        let scheduler = Scheduler::spawn(tx).unwrap();
        drop(scheduler);
    }
}
