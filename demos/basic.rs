use std::time::Duration;

use nonzero_ext::nonzero;
use zeropoint::{Controller, RateLimit};

fn main() {
    let controller = Controller::new(RateLimit::per_second_and_burst(
        nonzero!(10u32),
        nonzero!(20u32),
    ));
    // the bucket starts full
    assert!(controller.allow_n(20.0));
    assert!(!controller.allow_n(5.0));
    // half a second later 5 tokens have been generated
    std::thread::sleep(Duration::from_millis(500));
    assert!(controller.allow_n(5.0));

    // reserve ahead, then change our mind
    let mut claim = controller.reserve_now(10.0).unwrap();
    println!("would act in {:?}", claim.delay_from(controller.now()));
    claim.cancel();
    assert!(claim.is_cancelled());
}
