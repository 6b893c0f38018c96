
// Synthesizes a 64000-point linear chirp, uploads it to an Agilent 33250A
// over the serial line, and saves it to a named non-volatile slot

use std::f64::consts::PI;

use scpi_serial::devices::ag33250a::{AG33250A, SAMPLES_PER_UPLOAD};
use scpi_serial::transport::SerialConfig;

const F0_HZ: f64 = 2.0e4;
const F1_HZ: f64 = 1.0e7;
const SWEEP_SEC: f64 = 1.0e-3;
const AMPLITUDE: f64 = 2047.0;

fn main() {
    env_logger::init();

    let config = SerialConfig::default();
    let mut wg = AG33250A::open(&config).unwrap();

    println!("{}", serde_json::to_string_pretty(&wg.idn).unwrap());

    // Linear chirp from F0 to F1 over the sweep time
    let n = SAMPLES_PER_UPLOAD;
    let samples: Vec<i16> = (0..n).map(|i| {
        let t = SWEEP_SEC * (i as f64) / ((n - 1) as f64);
        let phi = 2.0 * PI * (F0_HZ * t + (F1_HZ - F0_HZ) * t * t / (2.0 * SWEEP_SEC));
        (AMPLITUDE * phi.sin()) as i16
    }).collect();

    wg.upload_binary(&samples).unwrap();
    wg.save_volatile("CHIRP").unwrap();

    wg.select_user_function().unwrap();
    wg.set_output(true).unwrap();

    wg.close();
}
