#[macro_use]
extern crate log;
extern crate env_logger;
extern crate getopts;
extern crate metricpath;

use getopts::Options;
use metricpath::{
    Collector, Configuration, Declaration, Document, MemorySink, MetricSource, Source, SourceNode, Value, ValueKind,
};
use std::{
    env,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

struct Generator {
    ok: Arc<dyn Collector>,
    total: Arc<dyn Collector>,
    t0: Option<Instant>,
}

impl Generator {
    fn new(source: &Source) -> Generator {
        Generator {
            ok: source.collector("ok", &[]).expect("ok collector"),
            total: source.collector("total", &[]).expect("total collector"),
            t0: None,
        }
    }

    fn run(&mut self, done: &AtomicBool) {
        while !done.load(Ordering::Relaxed) {
            let t1 = Instant::now();
            if let Some(t0) = self.t0 {
                self.ok.put(Value::Duration(t1 - t0));
                self.total.put(Value::Long(1));
            }
            self.t0 = Some(t1);
        }
    }
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

pub fn opts() -> Options {
    let mut opts = Options::new();

    opts.optopt("p", "producers", "number of producers", "INTEGER");
    opts.optopt("d", "duration", "number of seconds to run for", "INTEGER");
    opts.optflag("h", "help", "print this help menu");

    opts
}

fn sample(metrics: &[metricpath::FormattedMetric], name: &str) -> i64 {
    metrics
        .iter()
        .filter_map(|m| m.sample(name))
        .map(|s| match s.value {
            Value::Long(v) => v,
            _ => 0,
        })
        .sum()
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = opts();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            error!("Failed to parse command line args: {}", f);
            return;
        },
    };

    if matches.opt_present("help") {
        print_usage(program, &opts);
        return;
    }

    info!("metricpath benchmark");

    let producers: usize = matches
        .opt_str("producers")
        .unwrap_or_else(|| "1".to_owned())
        .parse()
        .unwrap();
    let seconds: u64 = matches
        .opt_str("duration")
        .unwrap_or_else(|| "60".to_owned())
        .parse()
        .unwrap();

    info!("producers: {}", producers);
    info!("duration: {}s", seconds);

    let sink = Arc::new(MemorySink::new());
    let context = Configuration::new()
        .with_sink("rate", sink.clone())
        .document(
            Document::new()
                .trigger(Declaration::new("poll", "on_demand"))
                .collector(Declaration::new("latency", "histogram").param("percentiles", "50,90,99,99.9,100"))
                .collector(Declaration::new("count", "counter"))
                .sources(
                    SourceNode::root().sink("rate").trigger("poll").source(
                        SourceNode::new("benchmark.Generator")
                            .source(SourceNode::new("ok").collector("latency"))
                            .source(SourceNode::new("total").collector("count")),
                    ),
                ),
        )
        .build()
        .unwrap();

    let generator = Arc::new(
        MetricSource::builder("benchmark.Generator")
            .method("ok", &[], ValueKind::Duration)
            .method("total", &[], ValueKind::Long)
            .build()
            .unwrap(),
    );
    let source = context.source(&generator);

    info!("context configured");

    // Spin up our sample producers.
    let done = Arc::new(AtomicBool::new(false));
    let handles: Vec<_> = (0..producers)
        .map(|_| {
            let mut generator = Generator::new(&source);
            let done = done.clone();
            thread::spawn(move || generator.run(&done))
        })
        .collect();

    // Poll the controller to figure out the sample rate.
    let controller = context.controller();
    let mut total = 0;
    let mut t0 = Instant::now();
    for _ in 0..seconds {
        thread::sleep(Duration::new(1, 0));
        let t1 = Instant::now();

        controller.fire("poll").unwrap();
        let metrics = sink.drain();
        let turn_total = sample(&metrics, "benchmark.Generator.total.count");
        total += turn_total;
        let rate = turn_total as f64 / (t1 - t0).as_secs_f64();

        info!("rate: {} samples per second", rate);
        info!(
            "latency (ns): p50: {} p90: {} p99: {} p999: {} max: {}",
            sample(&metrics, "benchmark.Generator.ok.p50"),
            sample(&metrics, "benchmark.Generator.ok.p90"),
            sample(&metrics, "benchmark.Generator.ok.p99"),
            sample(&metrics, "benchmark.Generator.ok.p999"),
            sample(&metrics, "benchmark.Generator.ok.max"),
        );

        t0 = t1;
    }

    done.store(true, Ordering::Relaxed);
    for handle in handles {
        let _ = handle.join();
    }
    context.shutdown();

    info!("total metrics pushed: {}", total);
}
