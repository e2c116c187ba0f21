// References, dereferences, pointer arithmetic and the generic pointer.

use crate::common::{assert_ir, assert_main_ir, compile_err};

#[test]
fn address_of_yields_the_storage_temporary() {
    assert_main_ir(
        r#"
        var i I32
        var p [I32]
        p = &i
        "#,
        r#"
        %t1 =l alloc4 4
        storew 0, %t1
        %t2 =l alloc8 8
        storel 0, %t2
        storel %t1, %t2
        "#,
    );
}

#[test]
fn dereference_loads_through_the_pointer() {
    assert_main_ir(
        r#"
        var p [I32]
        _ = [p]
        "#,
        r#"
        %t1 =l alloc8 8
        storel 0, %t1

        %t2 =l loadl %t1
        %t3 =w loadw %t2
        "#,
    );
}

#[test]
fn dereference_assignment_stores_through_the_pointer() {
    assert_main_ir(
        r#"
        var i I32
        var p [I32]
        p = &i
        [p] = 2
        "#,
        r#"
        %t1 =l alloc4 4
        storew 0, %t1
        %t2 =l alloc8 8
        storel 0, %t2
        storel %t1, %t2

        %t3 =l loadl %t2
        storew 2, %t3
        "#,
    );
}

#[test]
fn pointer_arithmetic_scales_by_element_size() {
    assert_main_ir(
        r#"
        var p [I32]
        p += 1
        var i I32
        p += i
        var bp [I8]
        bp += 1
        "#,
        r#"
        %t1 =l alloc8 8
        storel 0, %t1

        %t2 =l loadl %t1
        %t3 =l mul 4, 1
        %t4 =l add %t2, %t3
        storel %t4, %t1

        %t5 =l alloc4 4
        storew 0, %t5

        %t6 =l loadl %t1
        %t7 =w loadw %t5
        %t8 =l extsw %t7
        %t9 =l mul 4, %t8
        %t10 =l add %t6, %t9
        storel %t10, %t1

        %t11 =l alloc8 8
        storel 0, %t11

        %t12 =l loadl %t11
        %t13 =l add %t12, 1
        storel %t13, %t11
        "#,
    );
}

#[test]
fn unsigned_indices_widen_with_extuw() {
    assert_main_ir(
        r#"
        var p [I32]
        var u U32
        p += u
        "#,
        r#"
        %t1 =l alloc8 8
        storel 0, %t1
        %t2 =l alloc4 4
        storew 0, %t2

        %t3 =l loadl %t1
        %t4 =w loadw %t2
        %t5 =l extuw %t4
        %t6 =l mul 4, %t5
        %t7 =l add %t3, %t6
        storel %t7, %t1
        "#,
    );
}

#[test]
fn pointer_minus_integer_mirrors_addition() {
    assert_main_ir(
        r#"
        var p [I64]
        p -= 2
        "#,
        r#"
        %t1 =l alloc8 8
        storel 0, %t1

        %t2 =l loadl %t1
        %t3 =l mul 8, 2
        %t4 =l sub %t2, %t3
        storel %t4, %t1
        "#,
    );
}

#[test]
fn generic_pointers_scale_by_one_and_assign_freely() {
    assert_main_ir(
        r#"
        var p []
        p += 1
        var ip [I32]
        p = ip
        ip = p
        "#,
        r#"
        %t1 =l alloc8 8
        storel 0, %t1

        %t2 =l loadl %t1
        %t3 =l add %t2, 1
        storel %t3, %t1

        %t4 =l alloc8 8
        storel 0, %t4

        %t5 =l loadl %t4
        storel %t5, %t1

        %t6 =l loadl %t1
        storel %t6, %t4
        "#,
    );
}

#[test]
fn generic_pointer_may_not_be_dereferenced() {
    let err = compile_err(
        r#"
        fn f() {
            var p []
            _ = [p]
        }
        "#,
    );
    assert_eq!(err, "Generic pointer may not be dereferenced");
}

#[test]
fn named_pointer_types_meet_the_generic_pointer() {
    assert_ir(
        r#"
        type I8P [I8]
        type GP []
        fn f() {
            var g []
            var i8p I8P
            g = i8p
            i8p = g

            var gp GP
            g = gp
            gp = g
        }
        "#,
        r#"
        function $f() {
        @start
            %t1 =l alloc8 8
            storel 0, %t1
            %t2 =l alloc8 8
            storel 0, %t2

            %t3 =l loadl %t2
            storel %t3, %t1
            %t4 =l loadl %t1
            storel %t4, %t2

            %t5 =l alloc8 8
            storel 0, %t5

            %t6 =l loadl %t5
            storel %t6, %t1
            %t7 =l loadl %t1
            storel %t7, %t5

            ret
        }
        "#,
    );
}

#[test]
fn arrays_decay_in_pointer_arithmetic() {
    assert_ir(
        r#"
        type Foo struct {
            a [U64 4]
        }
        fn f() {
            var foo Foo
            [foo.a + 2] = 1
            var a [U8 7]
            [a + 2] = 1
        }
        "#,
        r#"
        function $f() {
        @start
            %t1 =l alloc8 32
            storel 0, %t1
            %t2 =l add %t1, 8
            storel 0, %t2
            %t3 =l add %t1, 16
            storel 0, %t3
            %t4 =l add %t1, 24
            storel 0, %t4

            %t5 =l mul 8, 2
            %t6 =l add %t1, %t5
            storel 1, %t6

            %t7 =l alloc4 7
            storeb 0, %t7
            %t8 =l add %t7, 1
            storeb 0, %t8
            %t9 =l add %t7, 2
            storeb 0, %t9
            %t10 =l add %t7, 3
            storeb 0, %t10
            %t11 =l add %t7, 4
            storeb 0, %t11
            %t12 =l add %t7, 5
            storeb 0, %t12
            %t13 =l add %t7, 6
            storeb 0, %t13

            %t14 =l add %t7, 2
            storeb 1, %t14

            ret
        }
        "#,
    );
}

#[test]
fn arithmetic_between_two_pointers_is_rejected() {
    let err = compile_err(
        r#"
        fn f() {
            var p, q [I32]
            _ = p + q
        }
        "#,
    );
    assert_eq!(err, "Arithmetic between two pointers is not supported");
}
