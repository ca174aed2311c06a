//! Whole-pipeline tests: source text in, printed lines out.

use pretty_assertions::assert_eq;
use quill::bytecode::VmConfig;
use quill::error::{CompileError, LexerError, QuillError, Trap};

fn run(source: &str) -> String {
    let out = quill::run_with_output(source, Vec::new(), VmConfig::default())
        .unwrap_or_else(|e| panic!("program failed: {}", e));
    String::from_utf8(out).unwrap()
}

fn run_err(source: &str) -> QuillError {
    match quill::run_with_output(source, Vec::new(), VmConfig::default()) {
        Ok(_) => panic!("program unexpectedly succeeded"),
        Err(e) => e,
    }
}

fn compile_err(source: &str) -> CompileError {
    match run_err(source) {
        QuillError::Compile(e) => e,
        other => panic!("expected compile error, got {}", other),
    }
}

#[test]
fn prints_arithmetic_result() {
    assert_eq!(
        run("fun main() { let x = 1 + 2 * 3; print(x); return }"),
        "7\n"
    );
}

#[test]
fn conditional_runs_true_branch_then_continues() {
    let source = "fun main() {
        let c = 1
        if (c) { print(1) } else { print(2) }
        print(3)
    }";
    assert_eq!(run(source), "1\n3\n");
}

#[test]
fn conditional_runs_false_branch_then_continues() {
    let source = "fun main() {
        let c = 0
        if (c) { print(1) } else { print(2) }
        print(3)
    }";
    assert_eq!(run(source), "2\n3\n");
}

#[test]
fn branch_locals_do_not_disturb_outer_locals() {
    let source = "fun main() {
        let a = 10
        if (a == 10) {
            let b = 20
            let c = 30
            print(a + b + c)
        } else {
            let d = 1
            print(d)
        }
        let e = 5
        print(a)
        print(e)
    }";
    assert_eq!(run(source), "60\n10\n5\n");
}

#[test]
fn branch_local_is_undeclared_afterwards() {
    let err = compile_err("fun main() { if (1) { let inner = 2 } print(inner) }");
    assert!(
        matches!(err, CompileError::UndeclaredIdentifier { ref name, .. } if name == "inner")
    );
}

#[test]
fn call_leaves_exactly_one_value() {
    let source = "fun add(a: int, b: int): int { return a + b }
    fun main() {
        let before = 10
        let sum = add(2, 3)
        print(sum)
        print(before)
    }";
    assert_eq!(run(source), "5\n10\n");
}

#[test]
fn recursion_is_balanced() {
    let source = "fun fib(n: int): int {
        if (n < 2) { return n }
        return fib(n - 1) + fib(n - 2)
    }
    fun main() { print(fib(15)) }";
    assert_eq!(run(source), "610\n");
}

#[test]
fn void_functions_and_bare_return() {
    let source = "fun countdown(n) {
        if (n == 0) { return }
        print(n)
        countdown(n - 1)
    }
    fun main() { countdown(3) }";
    assert_eq!(run(source), "3\n2\n1\n");
}

#[test]
fn doubles_print_with_six_decimals() {
    let source = "fun half(x: double): double { return x / 2.0 }
    fun main() {
        print(half(5.0))
        print(-1.5)
        print(0.1 + 0.2 > 0.3)
    }";
    assert_eq!(run(source), "2.500000\n-1.500000\n1\n");
}

#[test]
fn set_updates_locals_and_parameters() {
    let source = "fun twice(n: int): int {
        set n = n * 2
        return n
    }
    fun main() {
        let x = 1
        let y = 100
        set x = x + 41
        print(x)
        print(twice(y))
        print(y)
    }";
    assert_eq!(run(source), "42\n200\n100\n");
}

#[test]
fn logical_not_and_comparisons() {
    assert_eq!(
        run("fun main() { print(!0) print(!7) print(3 >= 3) print(2 != 2) }"),
        "1\n0\n1\n0\n"
    );
}

#[test]
fn mixed_parameter_types() {
    let source = "fun pick(flag: int, a: double, b: double): double {
        if (flag) { return a }
        return b
    }
    fun main() { print(pick(0, 1.25, 2.75)) print(pick(1, 1.25, 2.75)) }";
    assert_eq!(run(source), "2.750000\n1.250000\n");
}

#[test]
fn comments_are_ignored() {
    let source = "// entry point
    fun main() {
        /* a block
           comment */
        print(1) // trailing
    }";
    assert_eq!(run(source), "1\n");
}

#[test]
fn undeclared_function_fails_compilation() {
    let err = compile_err("fun main() { missing(1) }");
    assert!(matches!(err, CompileError::UndeclaredFunction { ref name, .. } if name == "missing"));
}

#[test]
fn duplicate_variable_fails_compilation() {
    let err = compile_err("fun main() { let x = 1; let x = 2 }");
    assert!(matches!(err, CompileError::DuplicateDeclaration { ref name, .. } if name == "x"));
}

#[test]
fn parameter_and_local_share_one_namespace() {
    let err = compile_err("fun f(a) { let a = 1 } fun main() { }");
    assert!(matches!(err, CompileError::DuplicateDeclaration { .. }));
}

#[test]
fn missing_main_fails_compilation() {
    let err = compile_err("fun helper() { }");
    assert!(matches!(err, CompileError::MissingEntry { .. }));
}

#[test]
fn syntax_errors_are_static() {
    let err = run_err("fun main() { let = 1 }");
    assert!(matches!(err, QuillError::Parser(_)));
    assert!(err.is_static());

    let err = run_err("fun main() { print(1 @ 2) }");
    assert!(matches!(err, QuillError::Lexer(_)));
}

#[test]
fn division_by_zero_traps() {
    let err = run_err("fun main() { let zero = 0; print(1 / zero) }");
    assert!(matches!(err, QuillError::Trap(Trap::DivisionByZero { .. })));
    assert!(!err.is_static());
}

#[test]
fn runaway_recursion_overflows_the_stack() {
    let source = "fun down(n: int): int { return down(n + 1) }
    fun main() { print(down(0)) }";
    let err = run_err(source);
    assert!(matches!(err, QuillError::Trap(Trap::StackOverflow { .. })));
}

#[test]
fn stack_capacity_is_configurable() {
    let source = "fun depth(n: int): int {
        if (n == 0) { return 0 }
        return depth(n - 1) + 1
    }
    fun main() { print(depth(100)) }";

    let small = VmConfig { stack_capacity: 64 };
    assert!(matches!(
        quill::run_with_output(source, Vec::new(), small),
        Err(QuillError::Trap(Trap::StackOverflow { .. }))
    ));
    assert_eq!(run(source), "100\n");
}

#[test]
fn disassembly_marks_functions() {
    let listing = quill::disassemble(
        "fun add(a: int, b: int): int { return a + b }
         fun main() { print(add(2, 3)) }",
    )
    .unwrap();
    assert!(listing.starts_with("== add(int, int): int ==\n0000 LoadArg 0\n"));
    assert!(listing.contains("== main(): void [entry] ==\n0012 PushInt 2\n"));
    assert!(listing.contains("Call 0000 args=2"));
}

#[test]
fn unterminated_block_comment_is_a_lexer_error() {
    let err = run_err("fun main() { print(1) } /* never closed");
    assert!(matches!(
        err,
        QuillError::Lexer(LexerError::UnterminatedComment(_))
    ));
    assert!(err.is_static());
}

#[test]
fn nan_prints_like_c() {
    let out = run("fun main() { let zero = 0.0; print(zero / zero) }");
    assert!(out == "nan\n" || out == "-nan\n", "got {:?}", out);
}

#[test]
fn minimum_int_is_reachable_by_arithmetic() {
    assert_eq!(
        run("fun main() { print(-2147483647 - 1) }"),
        "-2147483648\n"
    );
    assert!(matches!(
        run_err("fun main() { print(-2147483648) }"),
        QuillError::Lexer(LexerError::InvalidNumber(..))
    ));
}
