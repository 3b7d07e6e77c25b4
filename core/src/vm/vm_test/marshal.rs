use std::{thread, time::Duration};

use super::*;

#[test]
fn worker_threads_call_through_the_mailbox() {
    let mut console = Console::new();
    run(
        &mut console,
        vec![function(
            "mshTwice",
            &["%v"],
            vec![
                expr(assign("$mshCalls", add(var("$mshCalls"), int(1)))),
                ret(binary(BinaryOp::Mul, var("%v"), int(2))),
            ],
        )],
    );
    let (handle, mailbox) = Console::mailbox();

    let workers: Vec<_> = (0..3)
        .map(|n| {
            let handle = handle.clone();
            thread::spawn(move || handle.execute(&["mshTwice", &n.to_string()]).unwrap())
        })
        .collect();
    drop(handle);

    let mut served = 0;
    while console.process_one(&mailbox, Duration::from_secs(5)).unwrap() {
        served += 1;
        if served == 3 {
            break;
        }
    }
    let mut results: Vec<String> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    results.sort();
    assert_eq!(results, vec!["0", "2", "4"]);
    assert_eq!(console.get_variable("mshCalls"), "3");
    assert!(console.process_one(&mailbox, Duration::from_millis(10)).is_err());
}

#[test]
fn queued_requests_drain_in_one_pass() {
    let mut console = Console::new();
    let (handle, mailbox) = Console::mailbox();
    assert_eq!(console.process_mailbox(&mailbox), 0);
    assert!(!console.process_one(&mailbox, Duration::from_millis(1)).unwrap());

    let worker = thread::spawn(move || handle.execute(&["mshNothingHere"]).unwrap());
    while mailbox.pending() == 0 {
        thread::yield_now();
    }
    assert_eq!(console.process_mailbox(&mailbox), 1);
    assert_eq!(worker.join().unwrap(), "");
}

#[test]
fn handle_errors_once_the_console_side_is_gone() {
    let (handle, mailbox) = Console::mailbox();
    drop(mailbox);
    assert!(handle.execute(&["anything"]).is_err());
}
