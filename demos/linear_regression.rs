use accsgd_rs::{AccSgd, Defaults, GroupSpec, Param};
use ndarray::{Array1, Array2, Axis};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

const SAMPLES: usize = 256;
const FEATURES: usize = 8;
const BATCH_SIZE: usize = 32;

fn main() -> accsgd_rs::Result<()> {
    let mut rng = StdRng::seed_from_u64(0);
    let noise = Normal::new(0.0, 0.05).unwrap();
    let normal = Normal::new(0.0, 1.0).unwrap();

    // y = x @ w + b + noise, with a hidden w and b to recover
    let true_w = Array1::from_shape_fn(FEATURES, |_| normal.sample(&mut rng));
    let true_b = 0.5;
    let x = Array2::from_shape_fn((SAMPLES, FEATURES), |_| normal.sample(&mut rng));
    let y = x.dot(&true_w).mapv(|v| v + true_b + noise.sample(&mut rng));

    let w = Param::new(Array1::<f64>::zeros(FEATURES));
    let b = Param::new(Array1::<f64>::zeros(1));

    // weights get a little decay, the bias a larger step
    let mut optimiser = AccSgd::new(
        [
            GroupSpec::named("weights", [w.clone()])
                .weight_decay(1e-4)
                .into(),
            GroupSpec::named("bias", [b.clone()]).lr(0.05).into(),
        ],
        Defaults::with_lr(0.01).kappa(1000.0).xi(10.0),
    )?;

    for epoch in 0..20 {
        let mut cost = 0.0;
        for (xb, yb) in x
            .axis_chunks_iter(Axis(0), BATCH_SIZE)
            .zip(y.axis_chunks_iter(Axis(0), BATCH_SIZE))
        {
            cost += optimiser.step_with(|| {
                let wv: Array1<f64> = w.value().clone().into_dimensionality().unwrap();
                let bv = b.value()[[0]];

                let diff: Array1<f64> = xb.dot(&wv) + bv - &yb;
                let n = diff.len() as f64;

                // d/dw mean((x @ w + b - y)^2)
                let dw = xb.t().dot(&diff) * (2.0 / n);
                let db = diff.sum() * (2.0 / n);
                w.set_grad(Some(dw));
                b.set_grad(Some(Array1::from_elem(1, db)));

                diff.mapv(|d| d * d).mean().unwrap_or(0.0)
            })?;
        }

        println!("epoch {epoch:2}: cost {:.6}", cost / (SAMPLES / BATCH_SIZE) as f64);
    }

    println!("true w:    {true_w:.3}");
    println!("learned w: {:.3}", *w.value());
    println!("true b: {true_b:.3}, learned b: {:.3}", b.value()[[0]]);
    Ok(())
}
