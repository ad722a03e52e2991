/// End-to-end scripts through the library API.
///
/// Each test evaluates a small program with captured `puts` output and
/// checks the lines it printed or the error it raised.

use tcl::{Interpreter, TclError};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn output(script: &str) -> Vec<String> {
    let mut interp = Interpreter::with_captured_output();
    if let Err(e) = interp.eval(script) {
        panic!("script failed: {e}\n{script}");
    }
    interp.take_output()
}

fn check(script: &str, expected: &[&str]) {
    let got = output(script);
    assert_eq!(got, expected, "\nScript:\n{script}");
}

fn error_of(script: &str) -> String {
    let mut interp = Interpreter::with_captured_output();
    match interp.eval(script) {
        Ok(v) => panic!("expected an error, got {v}"),
        Err(e) => e.to_string(),
    }
}

// ── Procedures and scope ──────────────────────────────────────────────────────

#[test]
fn recursive_procedure() {
    check(
        "proc fib {n} {
            if {$n < 2} {return $n}
            expr {[fib [expr {$n - 1}]] + [fib [expr {$n - 2}]]}
        }
        puts [fib 15]",
        &["610"],
    );
}

#[test]
fn default_and_variadic_parameters() {
    check(
        "proc greet {name {greeting Hello} args} {
            puts \"$greeting, $name! [llength $args]\"
        }
        greet World
        greet Bob Hi 1 2 3",
        &["Hello, World! 0", "Hi, Bob! 3"],
    );
}

#[test]
fn procedure_locals_do_not_leak() {
    check(
        "set x global
        proc p {} {set x local; return $x}
        puts [p]
        puts $x",
        &["local", "global"],
    );
}

#[test]
fn uplevel_writes_into_caller() {
    check(
        "proc incr_caller {name} {uplevel 1 [list incr $name]}
        proc run {} {set n 1; incr_caller n; incr_caller n; return $n}
        puts [run]",
        &["3"],
    );
}

#[test]
fn uplevel_absolute_level_reaches_globals() {
    check(
        "proc deep {} {uplevel #0 {set g set-from-deep}}
        proc mid {} {deep}
        mid
        puts $g",
        &["set-from-deep"],
    );
}

#[test]
fn info_level_reports_call() {
    check(
        "proc who {a b} {info level 0}
        puts [who 1 {x y}]",
        &["who 1 {x y}"],
    );
}

#[test]
fn rename_and_delete_commands() {
    check(
        "proc old {} {return hi}
        rename old new
        puts [new]
        puts [info commands old]
        rename new {}
        puts [llength [info commands new]]",
        &["hi", "", "0"],
    );
}

// ── Control flow ──────────────────────────────────────────────────────────────

#[test]
fn nested_loops_with_break_and_continue() {
    check(
        "set out {}
        foreach i {1 2 3 4} {
            if {$i == 2} continue
            if {$i == 4} break
            for {set j 0} {$j < 3} {incr j} {
                if {$j == 1} break
                lappend out $i.$j
            }
        }
        puts $out",
        &["1.0 3.0"],
    );
}

#[test]
fn catch_reports_codes() {
    check(
        "puts [catch {error boom} msg]; puts $msg
        puts [catch {return val} msg]; puts $msg
        puts [catch break]
        puts [catch continue]
        puts [catch {set ok 1} msg]; puts $msg",
        &["1", "boom", "2", "val", "3", "4", "0", "1"],
    );
}

#[test]
fn while_loop_accumulates() {
    check(
        "set i 0; set sum 0
        while {$i < 10} {incr i; incr sum $i}
        puts $sum",
        &["55"],
    );
}

#[test]
fn foreach_over_pairs() {
    check(
        "foreach {k v} {a 1 b 2 c} {puts \"$k=$v\"}",
        &["a=1", "b=2", "c="],
    );
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[test]
fn error_messages() {
    assert_eq!(error_of("set nope"), "can't read \"nope\": no such variable");
    assert_eq!(error_of("nosuch"), "invalid command name \"nosuch\"");
    assert_eq!(error_of("set"), "wrong # args: should be \"set varName ?newValue?\"");
    assert_eq!(error_of("error {custom message}"), "custom message");
    assert_eq!(error_of("lindex {a b} x"), "bad index \"x\": must be integer?[+-]integer? or end?[+-]integer?");
}

#[test]
fn error_info_after_caught_error() {
    check(
        "proc f {} {error inner}
        catch f
        puts [lindex [split $errorInfo \\n] 0]",
        &["inner"],
    );
}

#[test]
fn caught_errors_do_not_disturb_loops() {
    check(
        "proc stray_break {} {break}
        proc stray_continue {} {continue}
        set r 0
        while {$r < 3} {incr r; catch stray_break}
        puts $r
        foreach i {1 2 3} {catch stray_continue; puts $i}
        catch stray_break
        puts after",
        &["3", "1", "2", "3", "after"],
    );
}

#[test]
fn exit_is_not_caught() {
    let mut interp = Interpreter::with_captured_output();
    let err = interp.eval("catch {exit 4}").unwrap_err();
    assert_eq!(err, TclError::Exit(4));
}

// ── Strings, lists and dicts ──────────────────────────────────────────────────

#[test]
fn string_and_list_pipeline() {
    check(
        "set words [split {the quick brown fox} { }]
        puts [llength $words]
        puts [join [lsort $words] ,]
        puts [string toupper [lindex $words end]]
        puts [lsearch -all $words *o*]",
        &["4", "brown,fox,quick,the", "FOX", "2 3"],
    );
}

#[test]
fn dict_round_trip() {
    check(
        "set d [dict create name Ada lang tcl]
        dict set d year 1843
        puts [dict get $d name]
        puts [dict size $d]
        puts [dict keys $d]
        puts [dict exists $d missing]",
        &["Ada", "3", "name lang year", "0"],
    );
}

#[test]
fn format_and_regexp() {
    check(
        "puts [format {%-5s|%05.1f|%x} ab 3.14159 255]
        regexp {(\\d+)-(\\d+)} {call 555-1234 now} all a b
        puts \"$a $b\"
        puts [regsub -all {o} {foo boo} 0]",
        &["ab   |003.1|ff", "555 1234", "f00 b00"],
    );
}

#[test]
fn subst_and_string_map() {
    check(
        "set who world
        puts [subst {hello $who [string length $who]}]
        puts [string map {a 1 b 2} abcab]",
        &["hello world 5", "12c12"],
    );
}

// ── Files ─────────────────────────────────────────────────────────────────────

#[test]
fn source_runs_file_and_reports_script() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("lib.tcl");
    std::fs::write(&lib, "proc twice {x} {expr {$x * 2}}\nset loaded [file tail [info script]]\n").unwrap();

    let mut interp = Interpreter::with_captured_output();
    interp.set_var("path", lib.display().to_string().into());
    interp.eval("source $path; puts [twice 21]; puts $loaded").unwrap();
    assert_eq!(interp.take_output(), vec!["42", "lib.tcl"]);
    assert_eq!(interp.eval("info script").unwrap().as_text(), "");
}

#[test]
fn file_and_glob_commands() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.tcl"), "").unwrap();
    std::fs::write(dir.path().join("b.tcl"), "abc").unwrap();
    std::fs::write(dir.path().join("c.txt"), "").unwrap();

    let mut interp = Interpreter::with_captured_output();
    interp.set_var("dir", dir.path().display().to_string().into());
    interp
        .eval(
            "puts [llength [glob [file join $dir *.tcl]]]
            puts [file size [file join $dir b.tcl]]
            puts [file exists [file join $dir nope]]
            puts [file extension [file join $dir c.txt]]",
        )
        .unwrap();
    assert_eq!(interp.take_output(), vec!["2", "3", "0", ".txt"]);
}

#[test]
fn missing_source_file_is_an_error() {
    let msg = error_of("source /definitely/not/here.tcl");
    assert!(msg.starts_with("couldn't read file \"/definitely/not/here.tcl\""), "{msg}");
}
