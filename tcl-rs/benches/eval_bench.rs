use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tcl::script::parser::parse_list;
use tcl::Interpreter;

const FIB: &str = "proc fib {n} {
    if {$n < 2} {return $n}
    expr {[fib [expr {$n - 1}]] + [fib [expr {$n - 2}]]}
}";

fn bench_procs(c: &mut Criterion) {
    let mut interp = Interpreter::with_captured_output();
    interp.eval(FIB).unwrap();

    let mut g = c.benchmark_group("procs");
    g.bench_function("fib_15", |b| b.iter(|| interp.eval(black_box("fib 15")).unwrap()));
    g.bench_function("counting_loop", |b| {
        b.iter(|| interp.eval(black_box("set s 0; for {set i 0} {$i < 1000} {incr i} {incr s $i}")).unwrap())
    });
    g.finish();
}

fn bench_lists(c: &mut Criterion) {
    let mut interp = Interpreter::with_captured_output();
    let text: String = (0..1000).map(|i| format!("item{i} {{x {i}}} ")).collect();

    interp.set_var("src", tcl::Value::list_of((0..1000).map(|i| i.to_string())));

    let mut g = c.benchmark_group("lists");
    g.bench_function("lappend_1000", |b| {
        b.iter(|| interp.eval(black_box("set l {}; foreach i $src {lappend l $i}; llength $l")).unwrap())
    });
    g.bench_function("parse_list_2000", |b| b.iter(|| parse_list(black_box(&text)).unwrap()));
    g.bench_function("lsort_integer", |b| {
        interp.eval("set nums {}; for {set i 1000} {$i > 0} {incr i -1} {lappend nums $i}").unwrap();
        b.iter(|| interp.eval(black_box("lsort -integer $nums")).unwrap())
    });
    g.finish();
}

fn bench_strings(c: &mut Criterion) {
    let mut interp = Interpreter::with_captured_output();
    interp.set_var("hay", "The quick brown FOX jumps over the lazy dog. ".repeat(1000).into());

    let mut g = c.benchmark_group("strings");
    g.bench_function("string_map", |b| {
        b.iter(|| interp.eval(black_box("string map -nocase {fox cat dog bird} $hay")).unwrap())
    });
    g.bench_function("regsub_all", |b| {
        b.iter(|| interp.eval(black_box("regsub -all {o(\\w)} $hay {0\\1}")).unwrap())
    });
    g.bench_function("string_match", |b| {
        b.iter(|| interp.eval(black_box("string match -nocase *LAZY*DOG* $hay")).unwrap())
    });
    g.finish();
}

criterion_group!(benches, bench_procs, bench_lists, bench_strings);
criterion_main!(benches);
