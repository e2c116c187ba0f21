// Error messages observable from the compile entry point.

use crate::common::compile_err;

#[test]
fn non_void_expression_statements_need_a_discard() {
    let err = compile_err(
        r#"
        fn f() {
            4 + 2
        }
        "#,
    );
    assert_eq!(err, "Expression returning non-void cannot be used as statement");
}

#[test]
fn call_argument_mismatches_name_both_types() {
    let err = compile_err(
        r#"
        fn f(x I32)
        fn g() {
            f("")
        }
        "#,
    );
    assert_eq!(err, "Type error in call to f: [I8] is not I32");
}

#[test]
fn call_mismatch_through_a_namespace_names_the_path() {
    let err = compile_err(
        r#"
        ns m {
            fn f(x [I64])
        }
        fn g() {
            m.f(1)
        }
        "#,
    );
    assert_eq!(err, "Type error in call to m.f: integer literal is not [I64]");
}

#[test]
fn arity_mismatches_are_rejected() {
    let err = compile_err(
        r#"
        fn f(x I32)
        fn g() {
            f(1, 2)
        }
        "#,
    );
    assert_eq!(err, "Wrong number of arguments in call to f");
}

#[test]
fn calling_a_non_function_fails() {
    let err = compile_err(
        r#"
        fn f() {
            var x I32
            x()
        }
        "#,
    );
    assert_eq!(err, "Invalid function type");
}

#[test]
fn assignment_requires_compatible_operands() {
    let err = compile_err(
        r#"
        fn f() {
            var i I32
            var p [I32]
            i = p
        }
        "#,
    );
    assert_eq!(err, "Operands of assignment are incompatible");
}

#[test]
fn literal_assignment_targets_are_rejected() {
    let err = compile_err(
        r#"
        fn f() {
            4 = 2
        }
        "#,
    );
    assert_eq!(err, "Lvalue of non-concrete type");
}

#[test]
fn binary_operands_must_be_compatible() {
    let err = compile_err(
        r#"
        fn f() {
            var i I32
            var l I64
            _ = i + l
        }
        "#,
    );
    assert_eq!(err, "Operands of binary expression are incompatible");
}

#[test]
fn bitwise_operators_require_integers() {
    let err = compile_err(
        r#"
        fn f() {
            var a, b F64
            _ = a % b
        }
        "#,
    );
    assert_eq!(err, "Operand of binary expression must be of integer type");
}

#[test]
fn dereferencing_a_non_pointer_fails() {
    let err = compile_err(
        r#"
        fn f() {
            var i I32
            _ = [i]
        }
        "#,
    );
    assert_eq!(err, "Dereference of non-pointer type");
}

#[test]
fn break_outside_a_loop_fails() {
    let err = compile_err(
        r#"
        fn f() {
            break
        }
        "#,
    );
    assert_eq!(err, "Break outside of loop");
}

#[test]
fn errors_leave_the_compiler_reusable() {
    use ternc::codegen::Compiler;
    use ternc::{lexer, parser};

    let bad = parser::parse(&lexer::tokenize("fn f() {\n\tx = 1\n}\n").unwrap()).unwrap();
    let good = parser::parse(&lexer::tokenize("fn f() {}\n").unwrap()).unwrap();

    let mut c = Compiler::new();
    assert!(c.compile(&bad).is_err());
    let out = c.compile(&good).unwrap();
    assert_eq!(
        crate::common::norm(&out),
        crate::common::norm("function $f() {\n@start\n\tret\n}\n")
    );
}
