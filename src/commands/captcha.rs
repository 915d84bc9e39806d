use coursedrill_registration::captcha;
use coursedrill_registration::SeededRandom;

use super::render_challenge;

pub fn run(count: usize, seed: Option<u64>) {
    let mut rng = SeededRandom::from_option(seed);
    for i in 1..=count {
        let challenge = captcha::generate(&mut rng);
        println!("{:>3}.  {}   → {}", i, render_challenge(&challenge), challenge.canonical());
    }
}
