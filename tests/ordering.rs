use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tsfn_queue::runtime::DesignatedCallback;
use tsfn_queue::{OwnerLoop, ThreadsafeFunction};

type Tagged = (usize, usize);

fn forward(callback: Option<&mut DesignatedCallback<Tagged>>, data: Tagged, _context: &()) {
    if let Some(callback) = callback {
        callback(vec![data]);
    }
}

fn collector(
    owner: &OwnerLoop,
    max_queue_size: usize,
) -> (ThreadsafeFunction<Tagged>, Rc<RefCell<Vec<Tagged>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let function = ThreadsafeFunction::<Tagged>::builder("ordering")
        .max_queue_size(max_queue_size)
        .callback(move |args: Vec<Tagged>| sink.borrow_mut().extend(args))
        .build(owner, ())
        .unwrap();
    (function, seen)
}

#[test]
fn each_producer_is_dispatched_in_its_own_order() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 500;

    let owner = OwnerLoop::new();
    let (function, seen) = collector(&owner, 16);

    let workers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            function.acquire().unwrap();
            let function = function.clone();
            thread::spawn(move || {
                for sequence in 0..PER_PRODUCER {
                    function
                        .blocking_call_with((producer, sequence), forward)
                        .unwrap();
                }
                function.release().unwrap();
            })
        })
        .collect();
    function.release().unwrap();

    assert!(owner.run_timeout(Duration::from_secs(30)));
    for worker in workers {
        worker.join().unwrap();
    }

    let seen = seen.borrow();
    assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER);
    let mut next = [0usize; PRODUCERS];
    for &(producer, sequence) in seen.iter() {
        assert_eq!(sequence, next[producer], "producer {producer} out of order");
        next[producer] += 1;
    }
}

#[test]
fn happens_before_across_threads_is_preserved() {
    let owner = OwnerLoop::new();
    let (function, seen) = collector(&owner, 0);
    function.acquire().unwrap();
    function.acquire().unwrap();

    let (handoff_tx, handoff_rx) = mpsc::channel::<()>();

    let first = function.clone();
    let a = thread::spawn(move || {
        first.blocking_call_with((0, 0), forward).unwrap();
        handoff_tx.send(()).unwrap();
        first.release().unwrap();
    });

    let second = function.clone();
    let b = thread::spawn(move || {
        handoff_rx.recv().unwrap();
        second.blocking_call_with((1, 0), forward).unwrap();
        second.release().unwrap();
    });

    a.join().unwrap();
    b.join().unwrap();
    function.release().unwrap();
    owner.run();

    assert_eq!(*seen.borrow(), vec![(0, 0), (1, 0)]);
}

#[test]
fn bare_and_data_calls_share_one_fifo() {
    let owner = OwnerLoop::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let function = ThreadsafeFunction::<Tagged>::builder("mixed")
        .callback(move |args: Vec<Tagged>| sink.borrow_mut().push(args))
        .build(&owner, ())
        .unwrap();

    function.non_blocking_call_with((0, 1), forward).unwrap();
    function.non_blocking_call().unwrap();
    function.blocking_call_with((0, 2), forward).unwrap();
    function.blocking_call().unwrap();
    function.release().unwrap();
    owner.run();

    assert_eq!(
        *seen.borrow(),
        vec![vec![(0, 1)], vec![], vec![(0, 2)], vec![]]
    );
}
