//! FFT based full convolution, used to cross check the direct engine.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::{
    convolution::{check_inputs, output_len, result_offset},
    Error, Sequence,
};

/// Full convolution of `x` and `y` computed in the frequency domain.
///
/// Same contract as [`crate::convolution::convolve`], results agree with it
/// within floating point tolerance but not bit for bit.
pub fn convolve(x: &Sequence, y: &Sequence) -> Result<Sequence, Error> {
    check_inputs(x, y)?;

    let len = output_len(x, y);

    // zero pad both to the full output length, no circular wrap around
    let mut x_spectrum = padded(x, len);
    let mut y_spectrum = padded(y, len);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(len);

    fft.process(&mut x_spectrum);
    fft.process(&mut y_spectrum);

    let mut product: Vec<Complex<f64>> = x_spectrum
        .iter()
        .zip(y_spectrum.iter())
        .map(|(a, b)| a * b)
        .collect();

    let ifft = planner.plan_fft_inverse(len);
    ifft.process(&mut product);

    let scale = 1.0 / len as f64;
    let data = product.into_iter().map(|s| s.re * scale).collect();

    Ok(Sequence::new(data, result_offset(x, y)))
}

fn padded(sequence: &Sequence, len: usize) -> Vec<Complex<f64>> {
    let mut buf: Vec<_> = sequence.iter().map(|s| Complex::new(*s, 0.0)).collect();
    buf.resize(len, Complex::new(0.0, 0.0));
    buf
}
