use coursedrill_registration::queue;
use coursedrill_registration::SeededRandom;

/// Print the queue a submit `elapsed_ms` after opening would see, step by step.
pub fn run(elapsed_ms: u64, steps: u32, seed: Option<u64>) {
    let mut rng = SeededRandom::from_option(seed);
    let mut state = queue::estimate_from_elapsed(elapsed_ms as f64, &mut rng);

    println!("Submitting {} ms after opening:", elapsed_ms);
    println!("  step  ahead    wait");
    println!("  {:>4}  {:>6}  {:>4}s", 0, state.queue_count, state.wait_seconds);

    let mut step = 0;
    while !state.is_clear() && step < steps {
        step += 1;
        state = queue::evolve(state.queue_count, &mut rng);
        println!("  {:>4}  {:>6}  {:>4}s", step, state.queue_count, state.wait_seconds);
    }

    if state.is_clear() {
        println!("Through after {} steps.", step);
    } else {
        println!("Still {} ahead after {} steps.", state.queue_count, step);
    }
}
